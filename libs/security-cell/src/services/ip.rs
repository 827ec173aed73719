use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use shared_config::AppConfig;

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    ip: String,
}

/// Caller IP resolution through a configurable lookup endpoint.
///
/// Failure-tolerant: audit entries carry `None` when the lookup is down
/// rather than failing the operation being audited.
pub struct IpLookupService {
    client: Client,
    lookup_url: String,
}

impl IpLookupService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            lookup_url: config.ip_lookup_url.clone(),
        }
    }

    pub async fn lookup(&self) -> Option<String> {
        if self.lookup_url.is_empty() {
            return None;
        }

        let response = match self.client.get(&self.lookup_url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("IP lookup failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("IP lookup returned {}", response.status());
            return None;
        }

        match response.json::<IpLookupResponse>().await {
            Ok(body) => Some(body.ip),
            Err(e) => {
                debug!("IP lookup body was not parseable: {}", e);
                None
            }
        }
    }
}
