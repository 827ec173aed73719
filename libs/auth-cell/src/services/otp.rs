use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use shared_utils::scratch::ScratchStore;

use crate::models::AuthCellError;

fn otp_key(email: &str) -> String {
    format!("otp:{}", email.to_lowercase())
}

/// Derive a six-digit code from fresh UUID entropy.
fn generate_code() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let seed = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    format!("{:06}", seed % 1_000_000)
}

/// One-time-code challenges kept in the injected scratch store; expiry is
/// the store's TTL.
pub struct OtpService {
    scratch: Arc<dyn ScratchStore>,
}

impl OtpService {
    pub fn new(scratch: Arc<dyn ScratchStore>) -> Self {
        Self { scratch }
    }

    /// Issue a new challenge, replacing any outstanding one for the email.
    pub async fn issue(&self, email: &str) -> Result<String, AuthCellError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AuthCellError::ValidationError(
                "A valid email is required".to_string(),
            ));
        }

        let code = generate_code();
        self.scratch.put(&otp_key(email), code.clone()).await;
        info!("Issued one-time code for {}", email);
        Ok(code)
    }

    /// Check and consume the challenge. A wrong code does not consume it;
    /// a correct one is single-use.
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), AuthCellError> {
        let key = otp_key(email);
        let stored = self.scratch.get(&key).await.ok_or(AuthCellError::InvalidOtp)?;

        if stored != code {
            debug!("One-time code mismatch for {}", email);
            return Err(AuthCellError::InvalidOtp);
        }

        self.scratch.remove(&key).await;
        Ok(())
    }
}
