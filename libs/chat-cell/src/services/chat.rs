use reqwest::Client;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{ChatError, ChatRequest, ChatResponse};

/// Proxy to the external report-chat service.
///
/// The service is an opaque collaborator: the request is forwarded as-is
/// and the answer comes back as-is. Any non-success status is an upstream
/// error with the body attached.
pub struct ChatService {
    client: Client,
    webhook_url: String,
}

impl ChatService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.chat_webhook_url.clone(),
        }
    }

    pub async fn ask(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        if self.webhook_url.is_empty() {
            return Err(ChatError::NotConfigured);
        }
        if request.question.trim().is_empty() {
            return Err(ChatError::ValidationError(
                "Question cannot be empty".to_string(),
            ));
        }

        debug!(
            "Forwarding chat question for patient {} ({} reports)",
            request.patient_id,
            request.report_ids.len()
        );

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat service returned {}: {}", status, body);
            return Err(ChatError::Upstream(format!("{}: {}", status, body)));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ChatError::Upstream(format!("Invalid chat response: {}", e)))
    }
}
