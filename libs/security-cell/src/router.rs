use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::audit::AuditService;

/// Cell state: the shared config plus the composition-root-owned audit
/// service, so the buffer survives across requests.
#[derive(Clone)]
pub struct SecurityState {
    pub config: Arc<AppConfig>,
    pub audit: Arc<AuditService>,
}

pub fn security_routes(config: Arc<AppConfig>, audit: Arc<AuditService>) -> Router {
    let state = SecurityState {
        config: config.clone(),
        audit,
    };

    Router::new()
        .route("/events", post(handlers::record_event))
        .route("/audit/{user_id}", get(handlers::get_user_audit_log))
        .route("/audit/flush", post(handlers::flush_audit_buffer))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
