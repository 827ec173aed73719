use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use schedule_cell::models::TimeSlot;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingError,
    CancelAppointmentRequest,
};

pub struct BookingService {
    supabase: SupabaseClient,
}

impl BookingService {
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

    /// Book a slot for a patient.
    ///
    /// The slot is claimed by one conditional update gated on
    /// `status=eq.available`; whichever request the store applies first
    /// wins, and the loser's update matches zero rows. There is no read
    /// before the update. If the appointment insert afterwards fails the
    /// slot stays claimed; the caller sees the error as-is.
    pub async fn book_slot(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment_id = Uuid::new_v4();
        info!(
            "Booking slot {} for patient {} as appointment {}",
            request.slot_id, request.patient_id, appointment_id
        );

        let claim_path = format!(
            "/rest/v1/time_slots?id=eq.{}&status=eq.available",
            request.slot_id
        );
        let claim_data = json!({
            "status": "booked",
            "appointment_id": appointment_id,
            "updated_at": Utc::now().to_rfc3339()
        });

        let claimed: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &claim_path,
                Some(auth_token),
                Some(claim_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if claimed.is_empty() {
            return Err(BookingError::SlotNotAvailable);
        }

        let slot: TimeSlot = serde_json::from_value(claimed[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse slot: {}", e)))?;

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "id": appointment_id,
            "patient_id": request.patient_id,
            "doctor_id": slot.doctor_id,
            "slot_id": slot.id,
            "appointment_date": slot.slot_date,
            "start_time": slot.start_time.format("%H:%M:%S").to_string(),
            "end_time": slot.end_time.format("%H:%M:%S").to_string(),
            "status": AppointmentStatus::Scheduled,
            "notes": request.notes,
            "cancellation_reason": null,
            "created_at": now,
            "updated_at": now
        });

        let inserted: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| {
                warn!(
                    "Slot {} claimed but appointment {} insert failed: {}",
                    slot.id, appointment_id, e
                );
                BookingError::DatabaseError(e.to_string())
            })?;

        if inserted.is_empty() {
            warn!(
                "Slot {} claimed but appointment {} insert returned no rows",
                slot.id, appointment_id
            );
            return Err(BookingError::DatabaseError(
                "Failed to create appointment".to_string(),
            ));
        }

        serde_json::from_value(inserted[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Cancel a scheduled appointment and release its slot.
    ///
    /// The release is gated on `status=eq.booked`; a slot already blocked
    /// or rebuilt by a schedule change is left alone.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(BookingError::NotCancellable);
        }

        let update_path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let update_data = json!({
            "status": AppointmentStatus::Cancelled,
            "cancellation_reason": request.reason,
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &update_path,
                Some(auth_token),
                Some(update_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if updated.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to cancel appointment".to_string(),
            ));
        }

        let release_path = format!(
            "/rest/v1/time_slots?appointment_id=eq.{}&status=eq.booked",
            appointment_id
        );
        let release_data = json!({
            "status": "available",
            "appointment_id": null,
            "updated_at": Utc::now().to_rfc3339()
        });
        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &release_path, Some(auth_token), Some(release_data))
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        info!("Cancelled appointment {}", appointment_id);

        serde_json::from_value(updated[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::AppointmentNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        self.list_by_filter(&format!("patient_id=eq.{}", patient_id), auth_token)
            .await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        self.list_by_filter(&format!("doctor_id=eq.{}", doctor_id), auth_token)
            .await
    }

    async fn list_by_filter(
        &self,
        filter: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        let path = format!(
            "/rest/v1/appointments?{}&order=appointment_date.asc,start_time.asc",
            filter
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
