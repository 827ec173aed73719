use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

use crate::models::{ChatError, ChatRequest};
use crate::services::chat::ChatService;

fn map_chat_error(err: ChatError) -> AppError {
    match err {
        ChatError::NotConfigured => AppError::ExternalService(err.to_string()),
        ChatError::ValidationError(msg) => AppError::ValidationError(msg),
        ChatError::Upstream(msg) => AppError::ExternalService(msg),
    }
}

#[axum::debug_handler]
pub async fn ask_about_reports(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, AppError> {
    // Patients ask about their own reports; doctors and admins about any.
    match user.role {
        Some(UserRole::Admin) | Some(UserRole::Doctor) => {}
        Some(UserRole::Patient) if user.id == request.patient_id.to_string() => {}
        _ => {
            return Err(AppError::Auth(
                "Not allowed to chat about this patient's reports".to_string(),
            ))
        }
    }

    let chat_service = ChatService::new(&state);
    let answer = chat_service.ask(request).await.map_err(map_chat_error)?;

    Ok(Json(json!(answer)))
}
