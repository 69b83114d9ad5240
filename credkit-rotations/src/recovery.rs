//! Paid recovery from lockout
//!
//! Recovery is the only exit from the blocked state: a fixed fee, always
//! charged, and only then is the block cleared and a fresh credential
//! issued. It is a thin specialization of the rotation attempt flow (same
//! journal replay, same idempotency key discipline, same
//! charge-before-mutate rule) with the guard inverted (`NotBlocked`
//! instead of `Blocked`) and the mutation resetting the counter.
//!
//! A recovered account gets a fresh free tier (`change_count` resets to
//! zero), and recovery itself is payable any number of times.

use crate::service::{FlowKind, RotationResult, RotationService};
use credkit_lib::{AccountId, Channel, Result};

impl RotationService {
    /// Recover a blocked credential by paying the recovery fee.
    ///
    /// Only valid while the record is blocked; otherwise fails with
    /// `NotBlocked` and performs no charge. The replay contract matches
    /// [`RotationService::request_rotation`]: retry a `PaymentUnknown`
    /// with the same `client_request_id`.
    pub async fn recover_access(
        &self,
        account: &AccountId,
        channel: &Channel,
        client_request_id: &str,
    ) -> Result<RotationResult> {
        crate::service::validate_ids(account, channel, "recovery")?;
        crate::service::validate_request_id(client_request_id)?;
        self.spawn_attempt(FlowKind::Recover, account, channel, client_request_id)
            .await
    }
}
