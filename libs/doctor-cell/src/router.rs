use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::specialties::SpecialtyCache;

/// Cell state: the shared config plus the injected specialty cache.
#[derive(Clone)]
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub specialty_cache: Arc<SpecialtyCache>,
}

pub fn doctor_routes(config: Arc<AppConfig>, specialty_cache: Arc<SpecialtyCache>) -> Router {
    let state = DoctorState {
        config: config.clone(),
        specialty_cache,
    };

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/search", get(handlers::search_doctors_public))
        .route("/specialties", get(handlers::list_specialties))
        .route("/{doctor_id}", get(handlers::get_doctor_public));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", put(handlers::update_doctor))
        .route("/{doctor_id}/verify", patch(handlers::verify_doctor))
        .route("/{doctor_id}/profile-image", post(handlers::upload_profile_image))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
