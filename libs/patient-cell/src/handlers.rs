use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CreatePatientRequest, CreatePreRegistrationRequest, PatientError, PreRegistrationStatus,
    UpdatePatientRequest, UpdatePreRegistrationStatusRequest, UploadLabReportRequest,
};
use crate::services::patient::PatientService;
use crate::services::pre_registration::PreRegistrationService;
use crate::services::reports::LabReportService;

fn map_patient_error(err: PatientError) -> AppError {
    match err {
        PatientError::NotFound => AppError::NotFound(err.to_string()),
        PatientError::EmailExists(_) => AppError::Conflict(err.to_string()),
        PatientError::InvalidDocument(msg) => AppError::BadRequest(msg),
        PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        PatientError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Patients see their own record; doctors and admins see any.
fn ensure_can_access_patient(user: &User, patient_id: Uuid) -> Result<(), AppError> {
    match user.role {
        Some(UserRole::Admin) | Some(UserRole::Doctor) => Ok(()),
        Some(UserRole::Patient) if user.id == patient_id.to_string() => Ok(()),
        _ => Err(AppError::Auth(
            "Not allowed to access this patient's records".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct PreRegistrationQuery {
    pub status: Option<PreRegistrationStatus>,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn create_pre_registration(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CreatePreRegistrationRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PreRegistrationService::new(&state);

    let registration = service
        .create(request, &state.supabase_anon_key)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "message": "Pre-registration submitted",
        "registration": registration
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let patient = service
        .create_patient(request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "message": "Patient record created",
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_patient(&user, patient_id)?;
    let service = PatientService::new(&state);

    let patient = service
        .get_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    // Only the patient themselves or an admin may edit the record.
    match user.role {
        Some(UserRole::Admin) => {}
        Some(UserRole::Patient) if user.id == patient_id.to_string() => {}
        _ => {
            return Err(AppError::Auth(
                "Not allowed to edit this patient record".to_string(),
            ))
        }
    }

    let service = PatientService::new(&state);
    let patient = service
        .update_patient(patient_id, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "message": "Patient record updated",
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn list_pre_registrations(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PreRegistrationQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;
    let service = PreRegistrationService::new(&state);

    let registrations = service
        .list(query.status, auth.token())
        .await
        .map_err(map_patient_error)?;

    let total = registrations.len();
    Ok(Json(json!({
        "registrations": registrations,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn update_pre_registration_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(registration_id): Path<Uuid>,
    Json(request): Json<UpdatePreRegistrationStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;
    let service = PreRegistrationService::new(&state);

    let registration = service
        .update_status(registration_id, request.status, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "message": "Pre-registration status updated",
        "registration": registration
    })))
}

#[axum::debug_handler]
pub async fn upload_lab_report(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UploadLabReportRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_patient(&user, patient_id)?;
    let uploaded_by = user
        .id
        .parse::<Uuid>()
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = LabReportService::new(&state);
    let report = service
        .upload_report(patient_id, uploaded_by, request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "message": "Lab report uploaded",
        "report": report
    })))
}

#[axum::debug_handler]
pub async fn list_lab_reports(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_can_access_patient(&user, patient_id)?;
    let service = LabReportService::new(&state);

    let reports = service
        .list_reports(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    let total = reports.len();
    Ok(Json(json!({
        "reports": reports,
        "total": total
    })))
}
