use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ClearScheduleResult, DoctorSchedule, GenerateScheduleRequest, GenerateScheduleResult,
    ModifyScheduleDayRequest, ScheduleDay, ScheduleError, ScheduleStatus, TimeSlot,
    SCHEDULE_WINDOW_DAYS,
};
use crate::services::slots::generate_time_slots;

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// First and last date (inclusive) of the rolling planning window.
    pub fn current_window() -> (NaiveDate, NaiveDate) {
        let start = Utc::now().date_naive();
        let end = start + Duration::days(SCHEDULE_WINDOW_DAYS - 1);
        (start, end)
    }

    fn day_of_week(date: NaiveDate) -> i32 {
        match date.weekday() {
            Weekday::Sun => 0,
            Weekday::Mon => 1,
            Weekday::Tue => 2,
            Weekday::Wed => 3,
            Weekday::Thu => 4,
            Weekday::Fri => 5,
            Weekday::Sat => 6,
        }
    }

    fn validate_day_shape(
        start_time: NaiveTime,
        end_time: NaiveTime,
        break_start: Option<NaiveTime>,
        break_end: Option<NaiveTime>,
        slot_duration_minutes: i32,
    ) -> Result<(), ScheduleError> {
        if start_time >= end_time {
            return Err(ScheduleError::InvalidTime(
                "Start time must be before end time".to_string(),
            ));
        }
        if slot_duration_minutes <= 0 {
            return Err(ScheduleError::ValidationError(
                "Slot duration must be positive".to_string(),
            ));
        }
        match (break_start, break_end) {
            (Some(bs), Some(be)) if bs >= be => Err(ScheduleError::InvalidTime(
                "Break start must be before break end".to_string(),
            )),
            (Some(_), None) | (None, Some(_)) => Err(ScheduleError::ValidationError(
                "Break start and break end must be provided together".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether any schedule rows exist for this doctor inside the window.
    /// Used to guard `generate` against duplicating a planning window.
    pub async fn has_any_schedules(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, ScheduleError> {
        let (start, end) = Self::current_window();
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&schedule_date=gte.{}&schedule_date=lte.{}&limit=1",
            doctor_id, start, end
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    /// Bulk-create the doctor's planning window.
    ///
    /// Each day is inserted independently: a failure partway through the
    /// loop leaves earlier days committed (no transaction wraps the loop).
    pub async fn generate_schedules(
        &self,
        doctor_id: Uuid,
        request: GenerateScheduleRequest,
        auth_token: &str,
    ) -> Result<GenerateScheduleResult, ScheduleError> {
        info!("Generating schedule window for doctor {}", doctor_id);

        Self::validate_day_shape(
            request.start_time,
            request.end_time,
            request.break_start,
            request.break_end,
            request.slot_duration_minutes,
        )?;

        if request.working_days.iter().any(|d| !(0..=6).contains(d)) {
            return Err(ScheduleError::ValidationError(
                "Working days must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }

        if self.has_any_schedules(doctor_id, auth_token).await? {
            return Err(ScheduleError::ScheduleExists);
        }

        let (window_start, _) = Self::current_window();
        let mut days_created = 0;
        let mut slots_created = 0;

        for offset in 0..SCHEDULE_WINDOW_DAYS {
            let date = window_start + Duration::days(offset);
            let day_of_week = Self::day_of_week(date);
            let is_available = request.working_days.contains(&day_of_week);

            let schedule = self
                .insert_schedule_day(doctor_id, date, is_available, &request, auth_token)
                .await?;
            days_created += 1;

            if is_available {
                slots_created += self
                    .insert_slots_for_day(&schedule, auth_token)
                    .await?;
            }
        }

        info!(
            "Generated {} schedule days and {} slots for doctor {}",
            days_created, slots_created, doctor_id
        );

        Ok(GenerateScheduleResult {
            days_created,
            slots_created,
        })
    }

    /// Per-day upsert: update the schedule row, then blank out or
    /// regenerate that day's slots depending on the new availability flag.
    pub async fn modify_schedule_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        request: ModifyScheduleDayRequest,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        debug!("Modifying schedule for doctor {} on {}", doctor_id, date);

        let current = self
            .get_schedule_for_date(doctor_id, date, auth_token)
            .await?
            .ok_or(ScheduleError::NotFound)?;

        let is_available = request.is_available.unwrap_or(current.is_available);
        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        let break_start = request.break_start.or(current.break_start);
        let break_end = request.break_end.or(current.break_end);
        let slot_duration_minutes = request
            .slot_duration_minutes
            .unwrap_or(current.slot_duration_minutes);

        Self::validate_day_shape(start_time, end_time, break_start, break_end, slot_duration_minutes)?;

        let update_data = json!({
            "is_available": is_available,
            "start_time": start_time.format("%H:%M:%S").to_string(),
            "end_time": end_time.format("%H:%M:%S").to_string(),
            "break_start": break_start.map(|t| t.format("%H:%M:%S").to_string()),
            "break_end": break_end.map(|t| t.format("%H:%M:%S").to_string()),
            "slot_duration_minutes": slot_duration_minutes,
            "status": if is_available { ScheduleStatus::Active } else { ScheduleStatus::Inactive },
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", current.id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(update_data),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::DatabaseError(
                "Failed to update schedule".to_string(),
            ));
        }

        let updated: DoctorSchedule = serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))?;

        // The day's slots are rebuilt wholesale; booked state is not
        // carried over when the hours change.
        self.delete_slots_for_date(doctor_id, date, auth_token).await?;
        if updated.is_available {
            self.insert_slots_for_day(&updated, auth_token).await?;
        }

        Ok(updated)
    }

    /// Bulk delete every schedule and slot row inside the current window.
    /// Rows outside the window are untouched.
    pub async fn clear_schedules(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<ClearScheduleResult, ScheduleError> {
        let (start, end) = Self::current_window();
        info!(
            "Clearing schedules for doctor {} between {} and {}",
            doctor_id, start, end
        );

        let slots_path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=gte.{}&slot_date=lte.{}",
            doctor_id, start, end
        );
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &slots_path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let schedules_path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&schedule_date=gte.{}&schedule_date=lte.{}",
            doctor_id, start, end
        );
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &schedules_path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(ClearScheduleResult {
            window_start: start,
            window_end: end,
        })
    }

    /// Materialize the rolling window, merged with persisted rows.
    ///
    /// Days with no persisted record come back unavailable with default
    /// hours, so the editor always sees all 28 days.
    pub async fn get_schedule_days(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ScheduleDay>, ScheduleError> {
        let (start, end) = Self::current_window();

        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&schedule_date=gte.{}&schedule_date=lte.{}&order=schedule_date.asc",
            doctor_id, start, end
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let persisted: Vec<DoctorSchedule> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<DoctorSchedule>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedules: {}", e)))?;

        let default_start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let default_end = NaiveTime::from_hms_opt(17, 0, 0).unwrap();

        let mut days = Vec::with_capacity(SCHEDULE_WINDOW_DAYS as usize);
        for offset in 0..SCHEDULE_WINDOW_DAYS {
            let date = start + Duration::days(offset);
            let day = match persisted.iter().find(|s| s.schedule_date == date) {
                Some(row) => ScheduleDay {
                    schedule_date: row.schedule_date,
                    day_of_week: row.day_of_week,
                    is_available: row.is_available,
                    start_time: row.start_time,
                    end_time: row.end_time,
                    break_start: row.break_start,
                    break_end: row.break_end,
                    slot_duration_minutes: row.slot_duration_minutes,
                    status: row.status,
                    schedule_id: Some(row.id),
                },
                None => ScheduleDay {
                    schedule_date: date,
                    day_of_week: Self::day_of_week(date),
                    is_available: false,
                    start_time: default_start,
                    end_time: default_end,
                    break_start: None,
                    break_end: None,
                    slot_duration_minutes: 30,
                    status: ScheduleStatus::Inactive,
                    schedule_id: None,
                },
            };
            days.push(day);
        }

        Ok(days)
    }

    pub async fn get_slots_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=eq.{}&order=start_time.asc",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let slots: Vec<TimeSlot> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TimeSlot>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse slots: {}", e)))?;

        Ok(slots)
    }

    // Private helpers

    async fn get_schedule_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<DoctorSchedule>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&schedule_date=eq.{}",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let schedule: DoctorSchedule = serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))?;
        Ok(Some(schedule))
    }

    async fn insert_schedule_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        is_available: bool,
        request: &GenerateScheduleRequest,
        auth_token: &str,
    ) -> Result<DoctorSchedule, ScheduleError> {
        let now = Utc::now().to_rfc3339();
        let schedule_data = json!({
            "doctor_id": doctor_id,
            "schedule_date": date,
            "day_of_week": Self::day_of_week(date),
            "is_available": is_available,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "break_start": request.break_start.map(|t| t.format("%H:%M:%S").to_string()),
            "break_end": request.break_end.map(|t| t.format("%H:%M:%S").to_string()),
            "slot_duration_minutes": request.slot_duration_minutes,
            "status": if is_available { ScheduleStatus::Active } else { ScheduleStatus::Inactive },
            "created_at": now,
            "updated_at": now
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
                "/rest/v1/doctor_schedules",
                Some(auth_token),
                Some(schedule_data),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ScheduleError::DatabaseError(
                "Failed to create schedule day".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))
    }

    /// Generate and bulk-insert the slots for one schedule day.
    async fn insert_slots_for_day(
        &self,
        schedule: &DoctorSchedule,
        auth_token: &str,
    ) -> Result<i32, ScheduleError> {
        let break_window = match (schedule.break_start, schedule.break_end) {
            (Some(bs), Some(be)) => Some((bs, be)),
            _ => None,
        };

        let generated = generate_time_slots(
            schedule.start_time,
            schedule.end_time,
            schedule.slot_duration_minutes,
            break_window,
        );

        if generated.is_empty() {
            warn!(
                "Schedule day {} for doctor {} produced no slots",
                schedule.schedule_date, schedule.doctor_id
            );
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let rows: Vec<Value> = generated
            .iter()
            .map(|slot| {
                json!({
                    "doctor_id": schedule.doctor_id,
                    "slot_date": schedule.schedule_date,
                    "start_time": slot.start_time.format("%H:%M:%S").to_string(),
                    "end_time": slot.end_time.format("%H:%M:%S").to_string(),
                    "duration_minutes": slot.duration_minutes,
                    "status": slot.status,
                    "created_at": now,
                    "updated_at": now
                })
            })
            .collect();

        let count = rows.len() as i32;
        let _: Vec<Value> = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/time_slots",
                Some(auth_token),
                Some(Value::Array(rows)),
            )
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    async fn delete_slots_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&slot_date=eq.{}",
            doctor_id, date
        );
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}
