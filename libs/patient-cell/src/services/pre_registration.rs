use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreatePreRegistrationRequest, PatientError, PreRegistration, PreRegistrationStatus,
};

pub struct PreRegistrationService {
    supabase: SupabaseClient,
}

impl PreRegistrationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }

    /// Upload the identity document (if any), then insert the intake row.
    ///
    /// A failure after the upload leaves the document in the bucket with
    /// no row pointing at it; the error is surfaced as-is.
    pub async fn create(
        &self,
        request: CreatePreRegistrationRequest,
        auth_token: &str,
    ) -> Result<PreRegistration, PatientError> {
        if request.email.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "Email is required".to_string(),
            ));
        }

        let id_document_path = match &request.id_document {
            Some(payload) => Some(self.upload_document(payload, auth_token).await?),
            None => None,
        };

        let now = Utc::now().to_rfc3339();
        let registration_data = json!({
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "phone_number": request.phone_number,
            "date_of_birth": request.date_of_birth,
            "id_document_path": id_document_path,
            "status": PreRegistrationStatus::Pending,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patient_pre_registrations",
                Some(auth_token),
                Some(registration_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| {
                if let Some(path) = &id_document_path {
                    warn!(
                        "Pre-registration insert failed after document upload to {}: {}",
                        path, e
                    );
                }
                PatientError::DatabaseError(e.to_string())
            })?;

        if result.is_empty() {
            return Err(PatientError::DatabaseError(
                "Failed to create pre-registration".to_string(),
            ));
        }

        let registration: PreRegistration = serde_json::from_value(result[0].clone())
            .map_err(|e| {
                PatientError::DatabaseError(format!("Failed to parse pre-registration: {}", e))
            })?;
        info!("Created pre-registration {}", registration.id);
        Ok(registration)
    }

    pub async fn list(
        &self,
        status: Option<PreRegistrationStatus>,
        auth_token: &str,
    ) -> Result<Vec<PreRegistration>, PatientError> {
        let path = match status {
            Some(s) => format!(
                "/rest/v1/patient_pre_registrations?status=eq.{}&order=created_at.desc",
                s
            ),
            None => "/rest/v1/patient_pre_registrations?order=created_at.desc".to_string(),
        };

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PreRegistration>, _>>()
            .map_err(|e| {
                PatientError::DatabaseError(format!("Failed to parse pre-registrations: {}", e))
            })
    }

    pub async fn update_status(
        &self,
        registration_id: Uuid,
        status: PreRegistrationStatus,
        auth_token: &str,
    ) -> Result<PreRegistration, PatientError> {
        let path = format!(
            "/rest/v1/patient_pre_registrations?id=eq.{}",
            registration_id
        );
        let update_data = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::NotFound);
        }

        info!("Pre-registration {} marked {}", registration_id, status);
        serde_json::from_value(result[0].clone()).map_err(|e| {
            PatientError::DatabaseError(format!("Failed to parse pre-registration: {}", e))
        })
    }

    async fn upload_document(
        &self,
        payload: &str,
        auth_token: &str,
    ) -> Result<String, PatientError> {
        let parts: Vec<&str> = payload.split(',').collect();
        let base64_data = if parts.len() > 1 { parts[1] } else { payload };

        let document_data = BASE64
            .decode(base64_data)
            .map_err(|e| PatientError::InvalidDocument(e.to_string()))?;

        let file_ext = if payload.contains("application/pdf") {
            "pdf"
        } else if payload.contains("image/jpeg") || payload.contains("image/jpg") {
            "jpg"
        } else {
            "png"
        };
        let content_type = match file_ext {
            "pdf" => "application/pdf".to_string(),
            ext => format!("image/{}", ext),
        };

        let object_path = format!("{}.{}", Uuid::new_v4(), file_ext);
        self.supabase
            .upload_to_storage(
                "id-documents",
                &object_path,
                document_data,
                &content_type,
                auth_token,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}
