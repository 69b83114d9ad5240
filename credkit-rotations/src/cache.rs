//! TTL cache of read-only credential views
//!
//! Display surfaces poll credential status far more often than anyone
//! rotates, so status reads may be served from a short-lived cache. The
//! cache is never consulted for policy decisions (the service always
//! re-reads authoritative counters), and callers invalidate the entry
//! after every successful rotation or recovery.
//!
//! # Thread Safety
//!
//! Uses `RwLock` for shared access; expired entries are dropped lazily on
//! read and can be swept with [`StatusCache::cleanup_expired`].

use crate::service::{CredentialStatus, RotationService};
use credkit_lib::{AccountId, Channel, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct CacheEntry {
    status: CredentialStatus,
    expires_at: Instant,
}

/// Read-through TTL cache of [`CredentialStatus`] views.
pub struct StatusCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl StatusCache {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(account: &AccountId, channel: &Channel) -> (String, String) {
        (account.as_str().to_string(), channel.as_str().to_string())
    }

    /// Get a cached view if one is still fresh.
    pub fn get(&self, account: &AccountId, channel: &Channel) -> Option<CredentialStatus> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(&Self::key(account, channel))?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.status.clone())
    }

    /// Cache a freshly loaded view.
    pub fn insert(&self, account: &AccountId, channel: &Channel, status: CredentialStatus) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            Self::key(account, channel),
            CacheEntry {
                status,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop the cached view for one record.
    ///
    /// Called after every successful rotation or recovery so the next read
    /// observes the new credential.
    pub fn invalidate(&self, account: &AccountId, channel: &Channel) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&Self::key(account, channel));
    }

    /// Serve from cache, falling back to the authoritative store.
    pub async fn get_or_load(
        &self,
        service: &RotationService,
        account: &AccountId,
        channel: &Channel,
    ) -> Result<CredentialStatus> {
        if let Some(status) = self.get(account, channel) {
            return Ok(status);
        }
        let status = service.get_status(account, channel).await?;
        self.insert(account, channel, status.clone());
        Ok(status)
    }

    /// Remove expired entries to bound memory growth.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of cached entries (for monitoring/debugging).
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
