use std::sync::RwLock;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::DoctorError;

struct CachedSpecialties {
    values: Vec<String>,
    fetched_at: Instant,
}

/// TTL cache for the distinct specialty list.
///
/// Constructed once by the composition root and injected into the cell;
/// the TTL is explicit so tests can pin it to zero.
pub struct SpecialtyCache {
    ttl: Duration,
    inner: RwLock<Option<CachedSpecialties>>,
}

impl SpecialtyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Option<Vec<String>> {
        let guard = self.inner.read().ok()?;
        match guard.as_ref() {
            Some(cached) if cached.fetched_at.elapsed() < self.ttl => {
                Some(cached.values.clone())
            }
            _ => None,
        }
    }

    pub fn put(&self, values: Vec<String>) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(CachedSpecialties {
                values,
                fetched_at: Instant::now(),
            });
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }
}

pub struct SpecialtyService {
    supabase: SupabaseClient,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Distinct specialty names across verified doctors, served from the
    /// cache when it is still warm.
    pub async fn list_specialties(
        &self,
        cache: &SpecialtyCache,
        auth_token: &str,
    ) -> Result<Vec<String>, DoctorError> {
        if let Some(cached) = cache.get() {
            debug!("Serving {} specialties from cache", cached.len());
            return Ok(cached);
        }

        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/doctors?select=specialty&is_verified=eq.true",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let mut specialties: Vec<String> = result
            .iter()
            .filter_map(|row| row["specialty"].as_str())
            .map(|s| s.to_string())
            .collect();
        specialties.sort();
        specialties.dedup();

        cache.put(specialties.clone());
        Ok(specialties)
    }
}
