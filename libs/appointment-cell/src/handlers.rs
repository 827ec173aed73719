use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

use crate::models::{BookAppointmentRequest, BookingError, CancelAppointmentRequest};
use crate::services::booking::BookingService;

fn map_booking_error(err: BookingError) -> AppError {
    match err {
        BookingError::SlotNotAvailable => AppError::Conflict(err.to_string()),
        BookingError::AppointmentNotFound => AppError::NotFound(err.to_string()),
        BookingError::NotCancellable => AppError::Conflict(err.to_string()),
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Patients act on their own records; doctors on their own calendar;
/// admins on anything.
fn ensure_is_self_or_admin(user: &User, subject_id: Uuid) -> Result<(), AppError> {
    match user.role {
        Some(UserRole::Admin) => Ok(()),
        Some(UserRole::Patient) | Some(UserRole::Doctor) if user.id == subject_id.to_string() => {
            Ok(())
        }
        _ => Err(AppError::Auth(
            "Not allowed to act on another user's appointments".to_string(),
        )),
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_is_self_or_admin(&user, request.patient_id)?;
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .book_slot(request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "message": "Appointment booked",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    let existing = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    // Either side of the appointment may cancel it.
    if ensure_is_self_or_admin(&user, existing.patient_id).is_err() {
        ensure_is_self_or_admin(&user, existing.doctor_id)?;
    }

    let cancelled = booking_service
        .cancel_appointment(appointment_id, request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "message": "Appointment cancelled",
        "appointment": cancelled
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    if ensure_is_self_or_admin(&user, appointment.patient_id).is_err() {
        ensure_is_self_or_admin(&user, appointment.doctor_id)?;
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_is_self_or_admin(&user, patient_id)?;
    let booking_service = BookingService::new(&state);

    let appointments = booking_service
        .list_for_patient(patient_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_is_self_or_admin(&user, doctor_id)?;
    let booking_service = BookingService::new(&state);

    let appointments = booking_service
        .list_for_doctor(doctor_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    let total = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "total": total
    })))
}
