use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use shared_utils::scratch::ScratchStore;

use crate::handlers;

/// Cell state: the shared config plus the composition-root-owned scratch
/// store backing one-time codes.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub scratch: Arc<dyn ScratchStore>,
}

pub fn auth_routes(config: Arc<AppConfig>, scratch: Arc<dyn ScratchStore>) -> Router {
    let state = AuthState {
        config: config.clone(),
        scratch,
    };

    let public_routes = Router::new()
        .route("/validate", post(handlers::validate_token_handler))
        .route("/verify", post(handlers::verify_token_handler))
        .route("/session/refresh", post(handlers::refresh_session))
        .route("/otp/request", post(handlers::request_otp))
        .route("/otp/verify", post(handlers::verify_otp))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/profile", get(handlers::get_profile))
        .route("/dashboard", get(handlers::get_dashboard))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state);

    public_routes.merge(protected_routes)
}
