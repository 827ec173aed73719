use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Rolling planning window: today plus the next 27 days.
pub const SCHEDULE_WINDOW_DAYS: i64 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Inactive,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Active => write!(f, "active"),
            ScheduleStatus::Inactive => write!(f, "inactive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
    Break,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Available => write!(f, "available"),
            SlotStatus::Booked => write!(f, "booked"),
            SlotStatus::Blocked => write!(f, "blocked"),
            SlotStatus::Break => write!(f, "break"),
        }
    }
}

/// Persisted row in `doctor_schedules`: one calendar date for one doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub schedule_date: NaiveDate,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    pub is_available: bool,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: i32,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted row in `time_slots`.
///
/// At most one slot exists per (doctor, date, start-time); the unique
/// constraint lives in the database, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: SlotStatus,
    pub appointment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One day of the materialized rolling window, merged with any persisted
/// schedule record for that date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub schedule_date: NaiveDate,
    pub day_of_week: i32,
    pub is_available: bool,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: i32,
    pub status: ScheduleStatus,
    pub schedule_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateScheduleRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: i32,
    /// Days of week (0 = Sunday .. 6 = Saturday) the doctor works.
    pub working_days: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyScheduleDayRequest {
    pub is_available: Option<bool>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateScheduleResult {
    pub days_created: i32,
    pub slots_created: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearScheduleResult {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule not found for the requested date")]
    NotFound,

    #[error("Doctor already has schedules in the current planning window")]
    ScheduleExists,

    #[error("Invalid time window: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access to schedule")]
    Unauthorized,

    #[error("{0}")]
    DatabaseError(String),
}
