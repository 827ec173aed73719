use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AuditEntry, AuditOutcome, SecurityError};

const FLUSH_THRESHOLD: usize = 100;
const HIGH_RISK_THRESHOLD: u8 = 70;

/// Buffered audit log writer.
///
/// Entries are mirrored to structured logging immediately and batched to
/// the audit_logs table; the batch is written with the service's anon key
/// so audit writes never depend on a caller's session.
pub struct AuditService {
    supabase: SupabaseClient,
    anon_key: String,
    buffer: RwLock<Vec<AuditEntry>>,
}

impl AuditService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            anon_key: config.supabase_anon_key.clone(),
            buffer: RwLock::new(Vec::new()),
        }
    }

    #[instrument(skip(self, entry))]
    pub async fn record(&self, entry: AuditEntry) -> Result<(), SecurityError> {
        self.log_to_tracing(&entry);

        if entry.risk_score >= HIGH_RISK_THRESHOLD {
            error!(
                event_id = %entry.event_id,
                risk_score = entry.risk_score,
                event_type = ?entry.event_type,
                user_id = ?entry.user_id,
                ip_address = ?entry.ip_address,
                "High-risk audit event"
            );
        }

        let should_flush = {
            let mut buffer = self.buffer.write().await;
            buffer.push(entry);
            buffer.len() >= FLUSH_THRESHOLD
        };

        if should_flush {
            self.flush().await?;
        }

        Ok(())
    }

    fn log_to_tracing(&self, entry: &AuditEntry) {
        match entry.outcome {
            AuditOutcome::Success => {
                info!(
                    event_id = %entry.event_id,
                    event_type = ?entry.event_type,
                    user_id = ?entry.user_id,
                    patient_id = ?entry.patient_id,
                    risk_score = entry.risk_score,
                    "AUDIT: {}", entry.action
                );
            }
            AuditOutcome::Failure | AuditOutcome::Denied => {
                warn!(
                    event_id = %entry.event_id,
                    event_type = ?entry.event_type,
                    user_id = ?entry.user_id,
                    outcome = ?entry.outcome,
                    risk_score = entry.risk_score,
                    "AUDIT FAILURE: {}", entry.action
                );
            }
        }
    }

    /// Drain the buffer and bulk-insert the batch.
    ///
    /// The buffer is drained before the write; a failed write drops the
    /// batch from memory but the entries were already traced.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<(), SecurityError> {
        let entries = {
            let mut buffer = self.buffer.write().await;
            std::mem::take(&mut *buffer)
        };

        if entries.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = entries
            .iter()
            .map(|entry| {
                json!({
                    "event_id": entry.event_id,
                    "event_type": entry.event_type,
                    "action": entry.action,
                    "outcome": entry.outcome,
                    "user_id": entry.user_id,
                    "patient_id": entry.patient_id,
                    "ip_address": entry.ip_address,
                    "risk_score": entry.risk_score,
                    "context": entry.context,
                    "created_at": entry.timestamp.to_rfc3339()
                })
            })
            .collect();

        let count = rows.len();
        let _: Vec<Value> = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/audit_logs",
                Some(&self.anon_key),
                Some(Value::Array(rows)),
            )
            .await
            .map_err(|e| SecurityError::DatabaseError(e.to_string()))?;

        debug!("Flushed {} audit entries", count);
        Ok(())
    }

    pub async fn buffered_count(&self) -> usize {
        self.buffer.read().await.len()
    }

    /// Read persisted audit entries for one user, newest first.
    pub async fn entries_for_user(
        &self,
        user_id: &str,
        limit: Option<u32>,
        auth_token: &str,
    ) -> Result<Vec<Value>, SecurityError> {
        let path = format!(
            "/rest/v1/audit_logs?user_id=eq.{}&order=created_at.desc&limit={}",
            urlencoding::encode(user_id),
            limit.unwrap_or(100)
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SecurityError::DatabaseError(e.to_string()))
    }
}
