//! Error types for credkit operations.
//!
//! The taxonomy distinguishes the two billing failure modes: an explicit
//! decline ([`CredkitError::PaymentFailed`]) and an indeterminate outcome
//! ([`CredkitError::PaymentUnknown`]). The service layer never downgrades
//! the latter to the former: a caller that treated "unknown" as "not
//! charged" could be charged without knowing it.

use std::fmt;

/// Error codes for FFI and client integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CredkitErrorCode {
    /// Credential record not found
    NotFound = 4000,
    /// Account already onboarded to the channel
    AlreadyOnboarded = 4001,
    /// Rotation attempted while the record is blocked
    Blocked = 4100,
    /// Recovery attempted while the record is not blocked
    NotBlocked = 4101,
    /// Invalid request/data
    InvalidData = 5000,
    /// Serialization error
    Serialization = 5002,
    /// Billing explicitly declined the charge
    PaymentFailed = 6001,
    /// Billing outcome indeterminate (timeout/network)
    PaymentUnknown = 6002,
    /// Storage error
    Storage = 7000,
    /// Concurrent mutation detected (version check failed)
    PersistenceConflict = 7002,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for credkit operations.
#[derive(Debug)]
pub enum CredkitError {
    /// No credential record exists for (account, channel).
    NotFound {
        /// Account identifier
        account: String,
        /// Channel identifier
        channel: String,
    },

    /// The account already holds a credential for this channel.
    AlreadyOnboarded {
        /// Channel identifier
        channel: String,
    },

    /// Rotation was attempted on a blocked record; the caller must switch
    /// to the recovery flow.
    Blocked {
        /// Channel identifier
        channel: String,
    },

    /// Recovery was attempted on a record that is not blocked.
    NotBlocked {
        /// Channel identifier
        channel: String,
    },

    /// Invalid data provided.
    InvalidData {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Serialization/deserialization error.
    Serialization(String),

    /// Billing explicitly declined the charge (insufficient funds,
    /// card declined). Nothing was mutated; the caller may retry after
    /// remediating, reusing the same client request id.
    PaymentFailed {
        /// Decline reason from the billing gateway
        reason: String,
    },

    /// Billing outcome is indeterminate (timeout or transport failure
    /// between us and the gateway). Nothing was mutated, but a charge may
    /// have landed; the caller MUST retry with the same client request id
    /// so the gateway resolves the attempt via idempotent replay.
    PaymentUnknown {
        /// Transport-level detail
        reason: String,
    },

    /// Storage operation failed.
    Storage(String),

    /// Concurrent mutation detected: the record version changed between
    /// read and write. Safe to retry immediately with a fresh read.
    PersistenceConflict {
        /// Account identifier
        account: String,
        /// Channel identifier
        channel: String,
    },

    /// Internal/unexpected error.
    Internal(String),
}

impl CredkitError {
    /// Get the error code for FFI/client integration.
    pub fn code(&self) -> CredkitErrorCode {
        match self {
            Self::NotFound { .. } => CredkitErrorCode::NotFound,
            Self::AlreadyOnboarded { .. } => CredkitErrorCode::AlreadyOnboarded,
            Self::Blocked { .. } => CredkitErrorCode::Blocked,
            Self::NotBlocked { .. } => CredkitErrorCode::NotBlocked,
            Self::InvalidData { .. } => CredkitErrorCode::InvalidData,
            Self::Serialization(_) => CredkitErrorCode::Serialization,
            Self::PaymentFailed { .. } => CredkitErrorCode::PaymentFailed,
            Self::PaymentUnknown { .. } => CredkitErrorCode::PaymentUnknown,
            Self::Storage(_) => CredkitErrorCode::Storage,
            Self::PersistenceConflict { .. } => CredkitErrorCode::PersistenceConflict,
            Self::Internal(_) => CredkitErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// `PaymentUnknown` is retryable only under the replay contract: the
    /// retry must carry the same client request id (see
    /// [`CredkitError::must_reuse_request_id`]).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PersistenceConflict { .. } | Self::Storage(_) | Self::PaymentUnknown { .. }
        )
    }

    /// Returns true if a retry must reuse the original client request id.
    ///
    /// Retrying a `PaymentUnknown` with a fresh request id would derive a
    /// fresh idempotency key and risk a double charge.
    pub fn must_reuse_request_id(&self) -> bool {
        matches!(self, Self::PaymentUnknown { .. })
    }

    /// Create a not found error.
    pub fn not_found(account: impl Into<String>, channel: impl Into<String>) -> Self {
        Self::NotFound {
            account: account.into(),
            channel: channel.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error from any error type.
    pub fn storage<E: std::error::Error>(err: E) -> Self {
        Self::Storage(err.to_string())
    }
}

impl fmt::Display for CredkitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { account, channel } => {
                write!(f, "no credential for account {} on channel {}", account, channel)
            }
            Self::AlreadyOnboarded { channel } => {
                write!(f, "account already onboarded to channel {}", channel)
            }
            Self::Blocked { channel } => {
                write!(
                    f,
                    "credential on channel {} is blocked; use the paid recovery flow",
                    channel
                )
            }
            Self::NotBlocked { channel } => {
                write!(f, "credential on channel {} is not blocked", channel)
            }
            Self::InvalidData { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::PaymentFailed { reason } => write!(f, "payment declined: {}", reason),
            Self::PaymentUnknown { reason } => {
                write!(
                    f,
                    "payment outcome unknown ({}); retry with the same request id",
                    reason
                )
            }
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
            Self::PersistenceConflict { account, channel } => {
                write!(
                    f,
                    "concurrent update on credential for account {} channel {}",
                    account, channel
                )
            }
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for CredkitError {}

impl From<serde_json::Error> for CredkitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CredkitError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
