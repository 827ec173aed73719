use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{AuditEntry, RecordEventRequest, SecurityError};
use crate::router::SecurityState;
use crate::services::ip::IpLookupService;

fn map_security_error(err: SecurityError) -> AppError {
    match err {
        SecurityError::ValidationError(msg) => AppError::ValidationError(msg),
        SecurityError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<u32>,
}

/// Record an audit event on behalf of the authenticated caller.
#[axum::debug_handler]
pub async fn record_event(
    State(state): State<SecurityState>,
    Extension(user): Extension<User>,
    Json(request): Json<RecordEventRequest>,
) -> Result<Json<Value>, AppError> {
    let ip_service = IpLookupService::new(&state.config);
    let ip_address = ip_service.lookup().await;

    let mut entry = AuditEntry::new(request.event_type, request.action, request.outcome)
        .with_user(user.id.clone())
        .with_ip(ip_address)
        .with_risk_score(request.risk_score.unwrap_or(0));

    if let Some(patient_id) = request.patient_id {
        entry = entry.with_patient(patient_id);
    }
    if let Some(context) = request.context {
        entry.context = context;
    }

    let event_id = entry.event_id;
    state
        .audit
        .record(entry)
        .await
        .map_err(map_security_error)?;

    Ok(Json(json!({
        "message": "Event recorded",
        "event_id": event_id
    })))
}

#[axum::debug_handler]
pub async fn get_user_audit_log(
    State(state): State<SecurityState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let entries = state
        .audit
        .entries_for_user(&user_id, query.limit, auth.token())
        .await
        .map_err(map_security_error)?;

    let total = entries.len();
    Ok(Json(json!({
        "user_id": user_id,
        "entries": entries,
        "total": total
    })))
}

/// Force the buffered batch out to the store.
#[axum::debug_handler]
pub async fn flush_audit_buffer(
    State(state): State<SecurityState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;

    let pending = state.audit.buffered_count().await;
    state.audit.flush().await.map_err(map_security_error)?;

    Ok(Json(json!({
        "message": "Audit buffer flushed",
        "flushed": pending
    })))
}
