use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn patient_routes(state: Arc<AppConfig>) -> Router {
    // Pre-registration intake happens before any account exists.
    let public_routes = Router::new()
        .route("/pre-registrations", post(handlers::create_pre_registration));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/", post(handlers::create_patient))
        .route("/{patient_id}", get(handlers::get_patient))
        .route("/{patient_id}", put(handlers::update_patient))
        .route("/{patient_id}/reports", post(handlers::upload_lab_report))
        .route("/{patient_id}/reports", get(handlers::list_lab_reports))
        .route("/pre-registrations/list", get(handlers::list_pre_registrations))
        .route(
            "/pre-registrations/{registration_id}/status",
            patch(handlers::update_pre_registration_status),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
