//! # Credkit Rotation Engine
//!
//! Per-(account, channel) access credentials with quota-gated rotation:
//! a limited free tier, paid rotations after that, and a hard lockout
//! cleared only by a paid recovery.
//!
//! ## Consistency Model
//!
//! Billing and credential storage are two systems with no shared
//! transaction. Key properties:
//! - Deterministic idempotency keys per logical attempt
//! - Durable attempt journal written before any gateway call
//! - Record mutation only after a confirmed billing success
//! - Per-record serialization (async lock table + version check on save)
//!
//! A retry carrying the same client request id is always safe: completed
//! attempts replay their original result, interrupted attempts replay the
//! gateway call under the original idempotency key.

pub mod billing;
pub mod cache;
pub mod journal;
pub mod record;
pub mod recovery;
pub mod service;
pub mod store;
pub mod testing;

pub use billing::{BillingGateway, ChargeOutcome, GatewayError, REASON_RECOVER, REASON_ROTATE};
pub use cache::StatusCache;
pub use journal::{
    derive_idempotency_key, derive_request_key, AttemptJournal, AttemptRecord, AttemptState,
    FileAttemptJournal, MemoryAttemptJournal,
};
pub use record::CredentialRecord;
pub use service::{CredentialStatus, RotationResult, RotationService};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

// Policy lives in credkit-lib; re-exported here so engine consumers need a
// single import path.
pub use credkit_lib::{Decision, PolicyConfig, RotationPolicy};
