use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Question about a patient's uploaded reports, forwarded verbatim to the
/// external chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    pub patient_id: Uuid,
    #[serde(default)]
    pub report_ids: Vec<Uuid>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    #[error("Chat service is not configured")]
    NotConfigured,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Chat service error: {0}")]
    Upstream(String),
}
