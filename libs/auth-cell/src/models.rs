use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSessionRequest {
    pub refresh_token: String,
}

/// Token pair returned by the auth backend on a successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthCellError {
    #[error("Session could not be refreshed: {0}")]
    RefreshFailed(String),

    #[error("Invalid or expired one-time code")]
    InvalidOtp,

    #[error("Validation error: {0}")]
    ValidationError(String),
}
