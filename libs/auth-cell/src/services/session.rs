use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{AuthCellError, SessionTokens};

const MAX_REFRESH_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;

/// Session recovery against the auth backend's refresh-token grant.
pub struct SessionService {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SessionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    /// Exchange a refresh token for a fresh session.
    ///
    /// Up to three attempts with a doubling delay between them; the last
    /// error is what the caller sees.
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<SessionTokens, AuthCellError> {
        if refresh_token.trim().is_empty() {
            return Err(AuthCellError::ValidationError(
                "Refresh token is required".to_string(),
            ));
        }

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);
        let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut last_error = String::new();

        for attempt in 1..=MAX_REFRESH_ATTEMPTS {
            debug!("Session refresh attempt {}", attempt);

            match self.try_refresh(&url, refresh_token).await {
                Ok(tokens) => return Ok(tokens),
                Err(err) => {
                    warn!("Session refresh attempt {} failed: {}", attempt, err);
                    last_error = err;
                }
            }

            if attempt < MAX_REFRESH_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(AuthCellError::RefreshFailed(last_error))
    }

    async fn try_refresh(&self, url: &str, refresh_token: &str) -> Result<SessionTokens, String> {
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: {}", status, body));
        }

        response
            .json::<SessionTokens>()
            .await
            .map_err(|e| format!("Invalid refresh response: {}", e))
    }
}
