use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailure,
    PatientDataViewed,
    PatientDataModified,
    AppointmentBooked,
    AppointmentCancelled,
    ScheduleModified,
    DocumentUploaded,
    UnauthorizedAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

/// One audit record, buffered in memory and flushed in batches to the
/// audit_logs table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event_id: Uuid,
    pub event_type: AuditEventType,
    pub action: String,
    pub outcome: AuditOutcome,
    pub user_id: Option<String>,
    pub patient_id: Option<String>,
    pub ip_address: Option<String>,
    pub risk_score: u8,
    pub context: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType, action: String, outcome: AuditOutcome) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            action,
            outcome,
            user_id: None,
            patient_id: None,
            ip_address: None,
            risk_score: 0,
            context: json!({}),
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_patient(mut self, patient_id: String) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn with_risk_score(mut self, score: u8) -> Self {
        self.risk_score = score;
        self
    }

    pub fn add_context<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Value::Object(ref mut map) = self.context {
            map.insert(key.to_string(), json!(value));
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEventRequest {
    pub event_type: AuditEventType,
    pub action: String,
    pub outcome: AuditOutcome,
    pub patient_id: Option<String>,
    pub risk_score: Option<u8>,
    pub context: Option<Value>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SecurityError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    DatabaseError(String),
}
