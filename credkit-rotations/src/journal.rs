//! Durable attempt journal for idempotent retries
//!
//! Billing and the credential store are two systems with no shared
//! transaction, so the engine persists an intent entry *before* every
//! gateway call and completes it only after the mutation lands. That gives
//! two guarantees:
//!
//! - a retry carrying the same client request id replays the recorded
//!   result instead of charging and rotating a second time, and
//! - a charge confirmed right before a crash is discoverable afterwards:
//!   it is exactly a `ChargePending` entry whose idempotency key the
//!   gateway has settled. The [`AttemptJournal::unresolved`] listing is the
//!   input to that reconciliation sweep (scheduling of the sweep is the
//!   operator's concern, not the engine's).

use crate::service::RotationResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credkit_lib::{AccountId, Amount, Channel, CredkitError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Derive the stable key identifying one logical user action.
///
/// Deterministic over the caller-supplied request id plus the attempt's
/// scope, so a retry lands on the same journal entry while the same
/// request id aimed at a different record cannot collide with it.
pub fn derive_request_key(
    account: &AccountId,
    channel: &Channel,
    reason_code: &str,
    client_request_id: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(channel.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(reason_code.as_bytes());
    hasher.update(b":");
    hasher.update(client_request_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the billing idempotency key for one charge sequence of a request.
///
/// The gateway replays settled outcomes per key, including declines. An
/// indeterminate outcome must therefore reuse its key (to resolve the
/// in-flight charge), while a retry after a definitive decline needs a
/// fresh key (the user has remediated and wants a real second attempt).
/// Hence the sequence number on top of the stable request key.
pub fn derive_idempotency_key(request_key: &str, charge_seq: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request_key.as_bytes());
    hasher.update(b":");
    hasher.update(charge_seq.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Lifecycle state of a journaled attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptState {
    /// Intent persisted; the gateway call is in flight or its outcome is
    /// unknown. A retry must replay the gateway call with the same key.
    ChargePending,
    /// The attempt committed; `result` holds the response to replay.
    Completed,
    /// Billing explicitly declined. A retry may run the attempt afresh.
    Failed,
}

/// One journaled rotation/recovery attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Internal id of this journal entry.
    pub attempt_id: String,
    /// Caller-supplied id for the whole user action.
    pub client_request_id: String,
    /// Account the attempt targets.
    pub account_id: AccountId,
    /// Channel the attempt targets.
    pub channel: Channel,
    /// Billing reason code (`credential.rotate` / `credential.recover`).
    pub reason_code: String,
    /// Stable key for this logical action; journal entries live under it.
    pub request_key: String,
    /// Charge sequence within this action; bumped after a decline.
    pub charge_seq: u32,
    /// Idempotency key handed to the billing gateway for the current
    /// charge sequence.
    pub idempotency_key: String,
    /// Fee for this attempt (zero for free rotations).
    pub fee: Amount,
    /// Current lifecycle state.
    pub state: AttemptState,
    /// Response to replay once completed.
    pub result: Option<RotationResult>,
    /// Reason for the last failure, if any.
    pub failure_reason: Option<String>,
    /// Journal entry creation time.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Open a new attempt in `ChargePending` state.
    pub fn open(
        client_request_id: impl Into<String>,
        account_id: AccountId,
        channel: Channel,
        reason_code: &str,
        fee: Amount,
    ) -> Self {
        let client_request_id = client_request_id.into();
        let request_key =
            derive_request_key(&account_id, &channel, reason_code, &client_request_id);
        let idempotency_key = derive_idempotency_key(&request_key, 0);
        let now = Utc::now();
        Self {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            client_request_id,
            account_id,
            channel,
            reason_code: reason_code.to_string(),
            request_key,
            charge_seq: 0,
            idempotency_key,
            fee,
            state: AttemptState::ChargePending,
            result: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to `Completed`, recording the response to replay.
    pub fn complete(&mut self, result: RotationResult) {
        self.state = AttemptState::Completed;
        self.result = Some(result);
        self.failure_reason = None;
        self.updated_at = Utc::now();
    }

    /// Transition to `Failed` after an explicit decline.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = AttemptState::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Reopen a failed attempt for a real second charge.
    ///
    /// Advances the charge sequence so the gateway sees a fresh key; the
    /// previous decline stays settled under the old one.
    pub fn reopen_for_retry(&mut self, fee: Amount) {
        debug_assert_eq!(self.state, AttemptState::Failed);
        self.charge_seq += 1;
        self.idempotency_key = derive_idempotency_key(&self.request_key, self.charge_seq);
        self.fee = fee;
        self.state = AttemptState::ChargePending;
        self.failure_reason = None;
        self.updated_at = Utc::now();
    }
}

/// Storage trait for attempt records.
#[async_trait]
pub trait AttemptJournal: Send + Sync {
    /// Persist a newly opened attempt.
    async fn record(&self, attempt: &AttemptRecord) -> Result<()>;

    /// Persist a state change on an existing attempt.
    async fn update(&self, attempt: &AttemptRecord) -> Result<()>;

    /// Find the attempt for a request key, if any.
    async fn find(&self, request_key: &str) -> Result<Option<AttemptRecord>>;

    /// List `ChargePending` attempts untouched since `older_than`.
    ///
    /// This is the reconciliation surface: each entry names an idempotency
    /// key the billing ledger can be asked about, so a sweep can complete
    /// or refund charges that were confirmed but never applied.
    async fn unresolved(&self, older_than: DateTime<Utc>) -> Result<Vec<AttemptRecord>>;
}

/// In-memory journal for tests and short-lived tooling.
#[derive(Default)]
pub struct MemoryAttemptJournal {
    attempts: RwLock<HashMap<String, AttemptRecord>>,
}

impl MemoryAttemptJournal {
    /// Create a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptJournal for MemoryAttemptJournal {
    async fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        let mut attempts = self.attempts.write().unwrap_or_else(|e| e.into_inner());
        attempts.insert(attempt.request_key.clone(), attempt.clone());
        Ok(())
    }

    async fn update(&self, attempt: &AttemptRecord) -> Result<()> {
        let mut attempts = self.attempts.write().unwrap_or_else(|e| e.into_inner());
        attempts.insert(attempt.request_key.clone(), attempt.clone());
        Ok(())
    }

    async fn find(&self, request_key: &str) -> Result<Option<AttemptRecord>> {
        let attempts = self.attempts.read().unwrap_or_else(|e| e.into_inner());
        Ok(attempts.get(request_key).cloned())
    }

    async fn unresolved(&self, older_than: DateTime<Utc>) -> Result<Vec<AttemptRecord>> {
        let attempts = self.attempts.read().unwrap_or_else(|e| e.into_inner());
        Ok(attempts
            .values()
            .filter(|a| a.state == AttemptState::ChargePending && a.updated_at < older_than)
            .cloned()
            .collect())
    }
}

/// File-based journal, one JSON file per attempt under `attempts/`.
///
/// The request key (hex) doubles as the file name, so lookups never scan
/// and a replayed attempt lands on the same file.
pub struct FileAttemptJournal {
    base_path: PathBuf,
}

impl FileAttemptJournal {
    /// Create the journal rooted at `base_path`.
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(base_path.join("attempts"))?;
        Ok(Self { base_path })
    }

    fn attempt_path(&self, request_key: &str) -> PathBuf {
        self.base_path
            .join("attempts")
            .join(format!("{}.json", request_key))
    }

    fn write_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        let path = self.attempt_path(&attempt.request_key);
        let json = serde_json::to_string_pretty(attempt)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[async_trait]
impl AttemptJournal for FileAttemptJournal {
    async fn record(&self, attempt: &AttemptRecord) -> Result<()> {
        self.write_attempt(attempt)
    }

    async fn update(&self, attempt: &AttemptRecord) -> Result<()> {
        let path = self.attempt_path(&attempt.request_key);
        if !path.exists() {
            return Err(CredkitError::Storage(format!(
                "attempt {} is not journaled",
                attempt.attempt_id
            )));
        }
        self.write_attempt(attempt)
    }

    async fn find(&self, request_key: &str) -> Result<Option<AttemptRecord>> {
        let path = self.attempt_path(request_key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn unresolved(&self, older_than: DateTime<Utc>) -> Result<Vec<AttemptRecord>> {
        let dir = self.base_path.join("attempts");
        let mut result = Vec::new();
        if !dir.exists() {
            return Ok(result);
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let json = std::fs::read_to_string(&path)?;
            let attempt: AttemptRecord = serde_json::from_str(&json)?;
            if attempt.state == AttemptState::ChargePending && attempt.updated_at < older_than {
                result.push(attempt);
            }
        }

        Ok(result)
    }
}
