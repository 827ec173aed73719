use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub address: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub address: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub allergies: Option<String>,
    pub current_medications: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreRegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for PreRegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreRegistrationStatus::Pending => write!(f, "pending"),
            PreRegistrationStatus::Approved => write!(f, "approved"),
            PreRegistrationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A prospective patient's intake record, created before any account
/// exists and reviewed by staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreRegistration {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub id_document_path: Option<String>,
    pub status: PreRegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePreRegistrationRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    /// Base64 or data-URL encoded identity document, uploaded to the
    /// id-documents bucket before the record is inserted.
    pub id_document: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePreRegistrationStatusRequest {
    pub status: PreRegistrationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabReport {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLabReportRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_data: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with email {0} already exists")]
    EmailExists(String),

    #[error("Invalid document payload: {0}")]
    InvalidDocument(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    DatabaseError(String),
}
