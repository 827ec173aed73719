use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

use crate::models::{GenerateScheduleRequest, ModifyScheduleDayRequest, ScheduleError};
use crate::services::schedule::ScheduleService;

fn map_schedule_error(err: ScheduleError) -> AppError {
    match err {
        ScheduleError::NotFound => AppError::NotFound(err.to_string()),
        ScheduleError::ScheduleExists => AppError::Conflict(err.to_string()),
        ScheduleError::InvalidTime(msg) => AppError::BadRequest(msg),
        ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
        ScheduleError::Unauthorized => AppError::Auth(err.to_string()),
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// A doctor may only manage their own schedule; admins may manage anyone's.
fn ensure_can_manage(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    match user.role {
        Some(UserRole::Admin) => Ok(()),
        Some(UserRole::Doctor) if user.id == doctor_id.to_string() => Ok(()),
        Some(UserRole::Doctor) => Err(AppError::Auth(
            "Doctors can only manage their own schedule".to_string(),
        )),
        Some(UserRole::Patient) | None => Err(AppError::Auth(
            "Only doctors and admins can manage schedules".to_string(),
        )),
    }
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_slots_public(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Value>, AppError> {
    let schedule_service = ScheduleService::new(&state);

    let slots = schedule_service
        .get_slots_for_date(doctor_id, date, &state.supabase_anon_key)
        .await
        .map_err(map_schedule_error)?;

    let total = slots.len();
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "slots": slots,
        "total": total
    })))
}

// ==============================================================================
// PROTECTED SCHEDULE MANAGEMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_schedule_days(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;
    let schedule_service = ScheduleService::new(&state);

    let days = schedule_service
        .get_schedule_days(doctor_id, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn generate_schedules(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<GenerateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;
    let schedule_service = ScheduleService::new(&state);

    let result = schedule_service
        .generate_schedules(doctor_id, request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "message": "Schedule generated successfully",
        "days_created": result.days_created,
        "slots_created": result.slots_created
    })))
}

#[axum::debug_handler]
pub async fn modify_schedule_day(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
    Json(request): Json<ModifyScheduleDayRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;
    let schedule_service = ScheduleService::new(&state);

    let updated = schedule_service
        .modify_schedule_day(doctor_id, date, request, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "message": "Schedule day updated",
        "schedule": updated
    })))
}

#[axum::debug_handler]
pub async fn clear_schedules(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, doctor_id)?;
    let schedule_service = ScheduleService::new(&state);

    let result = schedule_service
        .clear_schedules(doctor_id, auth.token())
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "message": "Schedule window cleared",
        "window_start": result.window_start,
        "window_end": result.window_end
    })))
}
