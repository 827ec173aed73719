use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorImageUpload, DoctorSearchFilters,
    UpdateDoctorRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
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

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for {}", request.email);

        if request.full_name.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "Doctor name cannot be empty".to_string(),
            ));
        }
        if request.license_number.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "License number is required".to_string(),
            ));
        }

        let existing_path = format!(
            "/rest/v1/doctors?email=eq.{}",
            urlencoding::encode(&request.email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &existing_path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(DoctorError::EmailExists(request.email));
        }

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "full_name": request.full_name,
            "email": request.email,
            "specialty": request.specialty,
            "bio": request.bio,
            "license_number": request.license_number,
            "years_experience": request.years_experience,
            "is_verified": false,
            "is_available": true,
            "rating": 0.0,
            "total_consultations": 0,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(auth_token),
                Some(doctor_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::DatabaseError(
                "Failed to create doctor profile".to_string(),
            ));
        }

        let doctor: Doctor = serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))?;
        info!("Created doctor profile {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile {}", doctor_id);

        let mut update_data = serde_json::Map::new();
        if let Some(name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(name));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(experience) = request.years_experience {
            update_data.insert("years_experience".to_string(), json!(experience));
        }
        if let Some(available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(available));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    /// Flip the verification flag. Admin only; enforced at the handler.
    pub async fn verify_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let update_data = json!({
            "is_verified": true,
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
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        info!("Doctor {} verified", doctor_id);
        serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    pub async fn search_doctors(
        &self,
        filters: DoctorSearchFilters,
        limit: Option<i32>,
        offset: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let mut query_parts = vec!["is_available=eq.true".to_string()];

        if let Some(specialty) = filters.specialty {
            query_parts.push(format!(
                "specialty=ilike.%{}%",
                urlencoding::encode(&specialty)
            ));
        }
        if let Some(min_exp) = filters.min_experience {
            query_parts.push(format!("years_experience=gte.{}", min_exp));
        }
        if let Some(min_rating) = filters.min_rating {
            query_parts.push(format!("rating=gte.{}", min_rating));
        }
        if filters.is_verified_only.unwrap_or(true) {
            query_parts.push("is_verified=eq.true".to_string());
        }

        query_parts.push(format!("limit={}", limit.unwrap_or(50)));
        query_parts.push(format!("offset={}", offset.unwrap_or(0)));
        query_parts.push("order=rating.desc".to_string());

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()
            .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctors: {}", e)))
    }

    /// Decode a base64 (optionally data-URL) image, push it to the
    /// profile-images bucket and point the doctor row at the public URL.
    pub async fn upload_profile_image(
        &self,
        doctor_id: Uuid,
        upload: DoctorImageUpload,
        auth_token: &str,
    ) -> Result<String, DoctorError> {
        debug!("Uploading profile image for doctor {}", doctor_id);

        let parts: Vec<&str> = upload.file_data.split(',').collect();
        let base64_data = if parts.len() > 1 { parts[1] } else { &upload.file_data };

        let image_data = BASE64
            .decode(base64_data)
            .map_err(|e| DoctorError::InvalidImage(e.to_string()))?;

        let file_ext = if upload.file_data.contains("image/png") {
            "png"
        } else if upload.file_data.contains("image/jpeg") || upload.file_data.contains("image/jpg") {
            "jpg"
        } else {
            "png"
        };

        let object_path = format!("{}/{}.{}", doctor_id, Uuid::new_v4(), file_ext);
        let storage_path = self
            .supabase
            .upload_to_storage(
                "profile-images",
                &object_path,
                image_data,
                &format!("image/{}", file_ext),
                auth_token,
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let public_url = self.supabase.get_public_url(&storage_path);

        let update_path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let update_data = json!({
            "profile_image_url": public_url,
            "updated_at": Utc::now().to_rfc3339()
        });
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &update_path,
                Some(auth_token),
                Some(update_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        Ok(public_url)
    }
}
