use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}/slots/{date}", get(handlers::get_slots_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/{doctor_id}", get(handlers::get_schedule_days))
        .route("/{doctor_id}/generate", post(handlers::generate_schedules))
        .route("/{doctor_id}/days/{date}", put(handlers::modify_schedule_day))
        .route("/{doctor_id}", delete(handlers::clear_schedules))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
