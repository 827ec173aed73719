use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use chat_cell::router::chat_routes;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::specialties::SpecialtyCache;
use patient_cell::router::patient_routes;
use schedule_cell::router::schedule_routes;
use security_cell::router::security_routes;
use security_cell::services::audit::AuditService;
use shared_config::AppConfig;
use shared_utils::scratch::InMemoryScratchStore;

const SPECIALTY_CACHE_TTL: Duration = Duration::from_secs(600);
const OTP_TTL: Duration = Duration::from_secs(300);

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // Cross-request collaborators live here so their state survives
    // individual requests.
    let specialty_cache = Arc::new(SpecialtyCache::new(SPECIALTY_CACHE_TTL));
    let audit = Arc::new(AuditService::new(&state));
    let scratch = Arc::new(InMemoryScratchStore::new(OTP_TTL));

    Router::new()
        .route("/", get(|| async { "CarePoint API is running!" }))
        .nest("/auth", auth_routes(state.clone(), scratch))
        .nest("/doctors", doctor_routes(state.clone(), specialty_cache))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/chat", chat_routes(state.clone()))
        .nest("/security", security_routes(state.clone(), audit))
}
