//! Per-(account, channel) credential record
//!
//! The record is the unit of serialization for the whole engine: every
//! rotation or recovery reads one record, mutates it through the helpers
//! here, and writes it back under a version check. The helpers are the only
//! place the counter/flag invariants are enforced.

use chrono::{DateTime, Utc};
use credkit_lib::{AccessCode, AccountId, Channel};
use serde::{Deserialize, Serialize};

/// Durable credential state for one account on one channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Owning account; immutable.
    pub account_id: AccountId,
    /// Channel this credential authenticates; immutable.
    pub channel: Channel,
    /// The live credential. Never empty after first issuance.
    pub current_code: AccessCode,
    /// Completed rotations since issuance. Reset by recovery.
    pub change_count: u32,
    /// True once the change cap is reached; cleared only by recovery.
    pub is_blocked: bool,
    /// Display metadata, not policy-relevant.
    pub provider: Option<String>,
    /// Compare-and-swap token; bumped by the store on every save.
    pub version: u64,
    /// First issuance timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Issue the first credential for an account on a channel.
    pub fn onboard(account_id: AccountId, channel: Channel) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            channel,
            current_code: AccessCode::generate(),
            change_count: 0,
            is_blocked: false,
            provider: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach display metadata.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Apply a committed rotation.
    ///
    /// Replaces the code, advances the counter, and sets the blocked flag
    /// when the counter reaches `max_changes`. Callers must have charged
    /// (or established the attempt was free) before calling this.
    pub fn apply_rotation(&mut self, new_code: AccessCode, max_changes: u32) {
        self.current_code = new_code;
        self.change_count = self.change_count.saturating_add(1);
        if self.change_count >= max_changes {
            self.is_blocked = true;
        }
        self.updated_at = Utc::now();
    }

    /// Apply a committed recovery.
    ///
    /// Clears the block and resets the counter to zero, giving the account
    /// a fresh free tier. Callers must have charged the recovery fee first.
    pub fn apply_recovery(&mut self, new_code: AccessCode) {
        self.current_code = new_code;
        self.change_count = 0;
        self.is_blocked = false;
        self.updated_at = Utc::now();
    }
}
