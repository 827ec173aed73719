use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialty: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub license_number: String,
    pub years_experience: Option<i32>,
    pub is_verified: bool,
    pub is_available: bool,
    pub rating: f32,
    pub total_consultations: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub full_name: String,
    pub email: String,
    pub specialty: String,
    pub bio: Option<String>,
    pub license_number: String,
    pub years_experience: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub years_experience: Option<i32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSearchFilters {
    pub specialty: Option<String>,
    pub min_experience: Option<i32>,
    pub min_rating: Option<f32>,
    pub is_verified_only: Option<bool>,
}

/// Data-URL or raw base64 payload for a profile image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorImageUpload {
    pub file_data: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor with email {0} already exists")]
    EmailExists(String),

    #[error("Invalid image payload: {0}")]
    InvalidImage(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    DatabaseError(String),
}
