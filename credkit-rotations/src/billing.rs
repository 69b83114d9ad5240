//! Billing gateway interface
//!
//! The billing ledger is an external collaborator: the engine only sees the
//! [`BillingGateway`] trait. The gateway contract is exactly-once effect per
//! idempotency key: repeated calls with the same key return the original
//! outcome without charging again. The engine leans on that contract for
//! retry safety; it never infers success from a transport failure.

use async_trait::async_trait;
use credkit_lib::{AccountId, Amount};

/// Reason code for a paid rotation charge.
pub const REASON_ROTATE: &str = "credential.rotate";

/// Reason code for a lockout recovery charge.
pub const REASON_RECOVER: &str = "credential.recover";

/// Definite outcome of a charge attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The charge landed (or had already landed under this key).
    Approved,
    /// The ledger explicitly declined; nothing was charged.
    Declined {
        /// Decline reason (insufficient funds, limit, ...).
        message: String,
    },
}

/// Transport-level failure talking to the billing gateway.
///
/// An `Err` from [`BillingGateway::consume`] means the outcome is
/// indeterminate: the charge may or may not have landed. Callers surface
/// this as `PaymentUnknown` and require a replay with the same key.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The gateway did not answer in time.
    #[error("billing gateway timed out after {0}ms")]
    Timeout(u64),
    /// The connection failed mid-flight.
    #[error("billing transport error: {0}")]
    Transport(String),
}

/// Exactly-once-effect billing consumption keyed by an idempotency token.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Charge `amount` against the account's ledger.
    ///
    /// `idempotency_key` identifies the logical attempt: the gateway must
    /// return the cached outcome for a key it has already settled, without
    /// charging a second time.
    async fn consume(
        &self,
        account: &AccountId,
        amount: Amount,
        reason_code: &str,
        idempotency_key: &str,
    ) -> Result<ChargeOutcome, GatewayError>;
}
