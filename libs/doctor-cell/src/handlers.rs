use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    CreateDoctorRequest, DoctorError, DoctorImageUpload, DoctorSearchFilters, UpdateDoctorRequest,
};
use crate::router::DoctorState;
use crate::services::doctor::DoctorService;
use crate::services::specialties::SpecialtyService;

fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::NotFound => AppError::NotFound(err.to_string()),
        DoctorError::EmailExists(_) => AppError::Conflict(err.to_string()),
        DoctorError::InvalidImage(msg) => AppError::BadRequest(msg),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[derive(Debug, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    pub min_experience: Option<i32>,
    pub min_rating: Option<f32>,
    pub is_verified_only: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors_public(
    State(state): State<DoctorState>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state.config);

    let filters = DoctorSearchFilters {
        specialty: query.specialty,
        min_experience: query.min_experience,
        min_rating: query.min_rating,
        // Public search only ever sees verified doctors.
        is_verified_only: Some(true),
    };

    let doctors = doctor_service
        .search_doctors(filters, query.limit, query.offset, &state.config.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    let total = doctors.len();
    Ok(Json(json!({
        "doctors": doctors,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_public(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state.config);

    let doctor = doctor_service
        .get_doctor(doctor_id, &state.config.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<DoctorState>,
) -> Result<Json<Value>, AppError> {
    let specialty_service = SpecialtyService::new(&state.config);

    let specialties = specialty_service
        .list_specialties(&state.specialty_cache, &state.config.supabase_anon_key)
        .await
        .map_err(map_doctor_error)?;

    let total = specialties.len();
    Ok(Json(json!({
        "specialties": specialties,
        "total": total
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<DoctorState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;
    let doctor_service = DoctorService::new(&state.config);

    let doctor = doctor_service
        .create_doctor(request, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "message": "Doctor profile created",
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<DoctorState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    // A doctor edits their own profile; admins edit anyone's.
    match user.role {
        Some(UserRole::Admin) => {}
        Some(UserRole::Doctor) if user.id == doctor_id.to_string() => {}
        _ => {
            return Err(AppError::Auth(
                "Not allowed to edit this doctor profile".to_string(),
            ))
        }
    }

    let doctor_service = DoctorService::new(&state.config);
    let doctor = doctor_service
        .update_doctor(doctor_id, request, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "message": "Doctor profile updated",
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn verify_doctor(
    State(state): State<DoctorState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, UserRole::Admin)?;
    let doctor_service = DoctorService::new(&state.config);

    let doctor = doctor_service
        .verify_doctor(doctor_id, auth.token())
        .await
        .map_err(map_doctor_error)?;

    // The specialty list is derived from verified doctors only.
    state.specialty_cache.invalidate();

    Ok(Json(json!({
        "message": "Doctor verified",
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn upload_profile_image(
    State(state): State<DoctorState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(upload): Json<DoctorImageUpload>,
) -> Result<Json<Value>, AppError> {
    match user.role {
        Some(UserRole::Admin) => {}
        Some(UserRole::Doctor) if user.id == doctor_id.to_string() => {}
        _ => {
            return Err(AppError::Auth(
                "Not allowed to change this doctor's image".to_string(),
            ))
        }
    }

    let doctor_service = DoctorService::new(&state.config);
    let public_url = doctor_service
        .upload_profile_image(doctor_id, upload, auth.token())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "message": "Profile image uploaded",
        "profile_image_url": public_url
    })))
}
