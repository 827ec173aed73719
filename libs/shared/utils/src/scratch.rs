use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Short-lived key-value scratch state (OTP challenges, session recovery
/// markers). Behind a trait so tests and alternate deployments can swap
/// the backing store.
#[async_trait]
pub trait ScratchStore: Send + Sync {
    async fn put(&self, key: &str, value: String);
    async fn get(&self, key: &str) -> Option<String>;
    async fn remove(&self, key: &str) -> Option<String>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory scratch store with a single TTL injected at construction.
pub struct InMemoryScratchStore {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryScratchStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop expired entries. Called opportunistically on writes.
    async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl ScratchStore for InMemoryScratchStore {
    async fn put(&self, key: &str, value: String) {
        self.sweep().await;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    async fn remove(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        entries.remove(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value)
            } else {
                None
            }
        })
    }
}
