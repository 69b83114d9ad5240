//! Rotation orchestration
//!
//! [`RotationService`] owns the full lifecycle of a rotation attempt:
//! journal replay, policy evaluation, the billing charge, and the final
//! record mutation. Rotation and recovery share one code path
//! ([`FlowKind`] selects the guard, fee, and mutation), so the policy state
//! machine exists exactly once no matter how many channels consume it.
//!
//! # Consistency model
//!
//! Billing and the credential store are separate systems with no shared
//! transaction. The service's correctness rests on two rules:
//!
//! - never mutate the record on anything but a confirmed billing success;
//! - every charge is keyed by a deterministic idempotency key, so a retry
//!   of the same logical attempt replays the gateway's cached outcome
//!   instead of charging again.
//!
//! Attempts on the same record are serialized by a per-record async lock
//! (in-process) and the store's version check (cross-process). The attempt
//! itself runs on a spawned task: a caller that stops waiting abandons the
//! response, not the mutation.

use crate::billing::{BillingGateway, ChargeOutcome, REASON_RECOVER, REASON_ROTATE};
use crate::journal::{derive_request_key, AttemptJournal, AttemptRecord, AttemptState};
use crate::record::CredentialRecord;
use crate::store::CredentialStore;
use chrono::{DateTime, Utc};
use credkit_lib::{AccessCode, AccountId, Channel, CredkitError, PolicyConfig, Result, RotationPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Response for an accepted rotation or recovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationResult {
    /// The freshly issued credential.
    pub new_code: AccessCode,
    /// Rotation counter after the transition.
    pub change_count: u32,
    /// Whether the record is now blocked.
    pub is_blocked: bool,
    /// Whether this attempt was billed.
    pub was_charged: bool,
}

/// Read-only credential view for display and caching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialStatus {
    /// The live credential.
    pub current_code: AccessCode,
    /// Completed rotations since issuance (or last recovery).
    pub change_count: u32,
    /// Whether the record is blocked.
    pub is_blocked: bool,
    /// Whether the next rotation attempt would be billed.
    pub is_chargeable_next: bool,
}

/// Which flow a journaled attempt belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FlowKind {
    Rotate,
    Recover,
}

impl FlowKind {
    pub(crate) fn reason_code(self) -> &'static str {
        match self {
            Self::Rotate => REASON_ROTATE,
            Self::Recover => REASON_RECOVER,
        }
    }
}

/// Per-record async locks keyed by (account, channel).
///
/// The map itself is guarded by a std mutex held only long enough to clone
/// the record's lock handle; attempts then serialize on the tokio mutex.
#[derive(Default)]
struct RecordLocks {
    inner: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl RecordLocks {
    fn for_record(&self, account: &AccountId, channel: &Channel) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry((account.to_string(), channel.to_string()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Everything one attempt needs, owned, so it can run on a detached task.
pub(crate) struct AttemptContext {
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) gateway: Arc<dyn BillingGateway>,
    pub(crate) journal: Arc<dyn AttemptJournal>,
    pub(crate) policy: RotationPolicy,
    pub(crate) lock: Arc<tokio::sync::Mutex<()>>,
    pub(crate) kind: FlowKind,
    pub(crate) account: AccountId,
    pub(crate) channel: Channel,
    pub(crate) client_request_id: String,
}

/// Orchestrates credential rotation and recovery over pluggable storage
/// and billing collaborators.
pub struct RotationService {
    store: Arc<dyn CredentialStore>,
    gateway: Arc<dyn BillingGateway>,
    journal: Arc<dyn AttemptJournal>,
    policies: PolicyConfig,
    locks: RecordLocks,
}

impl RotationService {
    /// Create a service over the given collaborators.
    ///
    /// # Errors
    ///
    /// `InvalidData` if the policy configuration is inconsistent.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        gateway: Arc<dyn BillingGateway>,
        journal: Arc<dyn AttemptJournal>,
        policies: PolicyConfig,
    ) -> Result<Self> {
        policies
            .validate()
            .map_err(|e| CredkitError::invalid_data("policy", e))?;
        Ok(Self {
            store,
            gateway,
            journal,
            policies,
            locks: RecordLocks::default(),
        })
    }

    /// Issue the first credential for an account on a channel.
    pub async fn onboard(&self, account: &AccountId, channel: &Channel) -> Result<CredentialStatus> {
        validate_ids(account, channel, "onboard")?;
        let record = CredentialRecord::onboard(account.clone(), channel.clone());
        let stored = self.store.insert(&record).await?;
        tracing::info!(account = %account, channel = %channel, "credential issued");
        Ok(self.status_of(&stored))
    }

    /// Rotate the credential for (account, channel).
    ///
    /// `client_request_id` identifies the whole user action: retrying with
    /// the same id is always safe and returns the original result once the
    /// attempt has completed. After a `PaymentUnknown` the retry MUST
    /// reuse the id so the billing charge resolves by idempotent replay.
    pub async fn request_rotation(
        &self,
        account: &AccountId,
        channel: &Channel,
        client_request_id: &str,
    ) -> Result<RotationResult> {
        validate_ids(account, channel, "rotation")?;
        validate_request_id(client_request_id)?;
        self.spawn_attempt(FlowKind::Rotate, account, channel, client_request_id)
            .await
    }

    /// Read the authoritative status for (account, channel).
    pub async fn get_status(&self, account: &AccountId, channel: &Channel) -> Result<CredentialStatus> {
        validate_ids(account, channel, "status")?;
        let record = self
            .store
            .load(account, channel)
            .await?
            .ok_or_else(|| CredkitError::not_found(account.as_str(), channel.as_str()))?;
        Ok(self.status_of(&record))
    }

    /// List every credential status for an account.
    pub async fn list_statuses(&self, account: &AccountId) -> Result<Vec<(Channel, CredentialStatus)>> {
        let records = self.store.list(account).await?;
        Ok(records
            .iter()
            .map(|r| (r.channel.clone(), self.status_of(r)))
            .collect())
    }

    /// List charge attempts still pending past `older_than`.
    ///
    /// Input for an out-of-band reconciliation sweep: each entry carries
    /// the idempotency key under which the billing ledger can be queried
    /// for a confirmed-but-unapplied charge.
    pub async fn unresolved_attempts(&self, older_than: DateTime<Utc>) -> Result<Vec<AttemptRecord>> {
        self.journal.unresolved(older_than).await
    }

    /// The policy that governs a channel.
    pub fn policy_for(&self, channel: &Channel) -> &RotationPolicy {
        self.policies.policy_for(channel)
    }

    fn status_of(&self, record: &CredentialRecord) -> CredentialStatus {
        let policy = self.policies.policy_for(&record.channel);
        let decision = policy.evaluate(record.change_count, record.is_blocked);
        CredentialStatus {
            current_code: record.current_code.clone(),
            change_count: record.change_count,
            is_blocked: record.is_blocked,
            is_chargeable_next: decision.is_allowed() && !decision.fee().is_zero(),
        }
    }

    /// Run one attempt on a detached task.
    ///
    /// The spawned task owns everything it needs, so dropping this future
    /// (client went away) abandons only the response; the charge and the
    /// mutation still run to completion.
    pub(crate) async fn spawn_attempt(
        &self,
        kind: FlowKind,
        account: &AccountId,
        channel: &Channel,
        client_request_id: &str,
    ) -> Result<RotationResult> {
        let ctx = AttemptContext {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            journal: Arc::clone(&self.journal),
            policy: self.policies.policy_for(channel).clone(),
            lock: self.locks.for_record(account, channel),
            kind,
            account: account.clone(),
            channel: channel.clone(),
            client_request_id: client_request_id.to_string(),
        };
        tokio::spawn(run_attempt(ctx))
            .await
            .map_err(|e| CredkitError::Internal(format!("attempt task failed: {}", e)))?
    }
}

pub(crate) fn validate_ids(account: &AccountId, channel: &Channel, operation: &str) -> Result<()> {
    if account.as_str().is_empty() {
        return Err(CredkitError::invalid_data(
            "account",
            format!("{} requires a non-empty account id", operation),
        ));
    }
    if channel.as_str().is_empty() {
        return Err(CredkitError::invalid_data(
            "channel",
            format!("{} requires a non-empty channel id", operation),
        ));
    }
    Ok(())
}

pub(crate) fn validate_request_id(client_request_id: &str) -> Result<()> {
    if client_request_id.is_empty() {
        return Err(CredkitError::invalid_data(
            "client_request_id",
            "retry-safe operations require a caller-supplied request id",
        ));
    }
    Ok(())
}

/// One serialized attempt: replay check, guard, charge, mutate, journal.
async fn run_attempt(ctx: AttemptContext) -> Result<RotationResult> {
    let _guard = ctx.lock.lock().await;

    let reason = ctx.kind.reason_code();
    let key = derive_request_key(&ctx.account, &ctx.channel, reason, &ctx.client_request_id);

    let prior = ctx.journal.find(&key).await?;
    if let Some(attempt) = &prior {
        if attempt.state == AttemptState::Completed {
            tracing::debug!(
                account = %ctx.account,
                channel = %ctx.channel,
                "replaying completed attempt for request id"
            );
            return attempt
                .result
                .clone()
                .ok_or_else(|| CredkitError::Internal("completed attempt lost its result".into()));
        }
    }

    let record = ctx
        .store
        .load(&ctx.account, &ctx.channel)
        .await?
        .ok_or_else(|| CredkitError::not_found(ctx.account.as_str(), ctx.channel.as_str()))?;

    let fee = match ctx.kind {
        FlowKind::Rotate => {
            if record.is_blocked {
                return Err(CredkitError::Blocked {
                    channel: ctx.channel.to_string(),
                });
            }
            ctx.policy.evaluate(record.change_count, record.is_blocked).fee()
        }
        FlowKind::Recover => {
            if !record.is_blocked {
                return Err(CredkitError::NotBlocked {
                    channel: ctx.channel.to_string(),
                });
            }
            ctx.policy.recovery_fee
        }
    };
    let was_charged = !fee.is_zero();

    // Resume an interrupted attempt under its original idempotency key;
    // reopen a declined one under a fresh key (the user has remediated);
    // otherwise open a fresh entry. Either way the intent is durable
    // before the gateway is asked for money.
    let mut attempt = match prior {
        Some(a) if a.state == AttemptState::ChargePending => a,
        Some(mut a) => {
            a.reopen_for_retry(fee);
            a
        }
        None => AttemptRecord::open(
            &ctx.client_request_id,
            ctx.account.clone(),
            ctx.channel.clone(),
            reason,
            fee,
        ),
    };
    ctx.journal.record(&attempt).await?;

    if was_charged {
        match ctx
            .gateway
            .consume(&ctx.account, fee, reason, &attempt.idempotency_key)
            .await
        {
            Ok(ChargeOutcome::Approved) => {}
            Ok(ChargeOutcome::Declined { message }) => {
                attempt.fail(&message);
                ctx.journal.update(&attempt).await?;
                return Err(CredkitError::PaymentFailed { reason: message });
            }
            Err(err) => {
                // The charge may have landed. The attempt stays
                // ChargePending so a retry with the same request id replays
                // the gateway call under the same key instead of guessing.
                tracing::warn!(
                    account = %ctx.account,
                    channel = %ctx.channel,
                    error = %err,
                    "billing outcome indeterminate; awaiting idempotent retry"
                );
                return Err(CredkitError::PaymentUnknown {
                    reason: err.to_string(),
                });
            }
        }
    }

    let new_code = AccessCode::generate_distinct_from(&record.current_code);
    let mut updated = record;
    match ctx.kind {
        FlowKind::Rotate => updated.apply_rotation(new_code.clone(), ctx.policy.max_changes),
        FlowKind::Recover => updated.apply_recovery(new_code.clone()),
    }
    let stored = ctx.store.save(&updated).await?;

    let result = RotationResult {
        new_code,
        change_count: stored.change_count,
        is_blocked: stored.is_blocked,
        was_charged,
    };
    attempt.complete(result.clone());
    ctx.journal.update(&attempt).await?;

    tracing::info!(
        account = %ctx.account,
        channel = %ctx.channel,
        change_count = stored.change_count,
        blocked = stored.is_blocked,
        charged = was_charged,
        "credential transition committed"
    );
    Ok(result)
}
