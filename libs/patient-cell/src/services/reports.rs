use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{LabReport, PatientError, UploadLabReportRequest};

pub struct LabReportService {
    supabase: SupabaseClient,
}

impl LabReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Store the report file, then record it.
    ///
    /// Upload-then-insert with no rollback: an insert failure leaves the
    /// file orphaned in the bucket and surfaces the error.
    pub async fn upload_report(
        &self,
        patient_id: Uuid,
        uploaded_by: Uuid,
        request: UploadLabReportRequest,
        auth_token: &str,
    ) -> Result<LabReport, PatientError> {
        if request.file_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "Report file name is required".to_string(),
            ));
        }

        let parts: Vec<&str> = request.file_data.split(',').collect();
        let base64_data = if parts.len() > 1 { parts[1] } else { &request.file_data };
        let file_data = BASE64
            .decode(base64_data)
            .map_err(|e| PatientError::InvalidDocument(e.to_string()))?;

        let object_path = format!("{}/{}-{}", patient_id, Uuid::new_v4(), request.file_name);
        let file_path = self
            .supabase
            .upload_to_storage(
                "lab-reports",
                &object_path,
                file_data,
                &request.content_type,
                auth_token,
            )
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let report_data = json!({
            "patient_id": patient_id,
            "file_name": request.file_name,
            "file_path": file_path,
            "content_type": request.content_type,
            "uploaded_by": uploaded_by,
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/lab_reports",
                Some(auth_token),
                Some(report_data),
                Some(headers),
            )
            .await
            .map_err(|e| {
                warn!(
                    "Lab report insert failed after upload to {}: {}",
                    file_path, e
                );
                PatientError::DatabaseError(e.to_string())
            })?;

        if result.is_empty() {
            return Err(PatientError::DatabaseError(
                "Failed to record lab report".to_string(),
            ));
        }

        let report: LabReport = serde_json::from_value(result[0].clone())
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse report: {}", e)))?;
        info!("Stored lab report {} for patient {}", report.id, patient_id);
        Ok(report)
    }

    pub async fn list_reports(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<LabReport>, PatientError> {
        let path = format!(
            "/rest/v1/lab_reports?patient_id=eq.{}&order=created_at.desc",
            patient_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<LabReport>, _>>()
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse reports: {}", e)))
    }
}
