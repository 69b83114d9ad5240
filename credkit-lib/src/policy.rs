//! Rotation policy evaluation
//!
//! The policy is a pure function from a record's counters to a
//! [`Decision`]: rotations start free, become chargeable once the free tier
//! is spent, and stop entirely once the change cap is reached. The decision
//! carries the fee for the current attempt so the caller never re-derives
//! pricing.
//!
//! # Example
//!
//! ```
//! use credkit_lib::{Amount, policy::{Decision, RotationPolicy}};
//!
//! let policy = RotationPolicy::new(3, 12, Amount::from_minor_units(1649), Amount::from_minor_units(34900));
//!
//! assert_eq!(policy.evaluate(0, false), Decision::Free);
//! assert_eq!(
//!     policy.evaluate(3, false),
//!     Decision::Chargeable { fee: Amount::from_minor_units(1649) }
//! );
//! ```

use crate::{Amount, Channel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of evaluating the policy for one rotation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Rotation is within the free tier; no charge.
    Free,

    /// Rotation is allowed but must be paid for before it is applied.
    Chargeable {
        /// Fee for this attempt, in minor units.
        fee: Amount,
    },

    /// This attempt is the last one allowed: it is charged like a normal
    /// paid rotation and the record transitions to blocked once it
    /// completes.
    WillBlock {
        /// Fee for this attempt, in minor units.
        fee: Amount,
    },

    /// The record is blocked; only the recovery flow is permitted.
    Blocked,
}

impl Decision {
    /// Fee owed for this attempt (zero for free and blocked decisions).
    pub fn fee(&self) -> Amount {
        match self {
            Self::Chargeable { fee } | Self::WillBlock { fee } => *fee,
            Self::Free | Self::Blocked => Amount::zero(),
        }
    }

    /// True if completing this attempt blocks the record.
    pub fn will_block(&self) -> bool {
        matches!(self, Self::WillBlock { .. })
    }

    /// True if the attempt is admissible at all.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Rotation pricing and quota thresholds.
///
/// This is configuration, not per-user state: the same policy applies to
/// every record on a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Rotations below this count are free.
    pub free_changes_threshold: u32,
    /// Reaching this count blocks the record.
    pub max_changes: u32,
    /// Fee per paid rotation, in minor units.
    pub per_change_fee: Amount,
    /// Fee for recovering a blocked record, in minor units.
    pub recovery_fee: Amount,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            free_changes_threshold: 3,
            max_changes: 12,
            per_change_fee: Amount::from_minor_units(1649),
            recovery_fee: Amount::from_minor_units(34900),
        }
    }
}

impl RotationPolicy {
    /// Create a policy with explicit thresholds and fees.
    pub fn new(
        free_changes_threshold: u32,
        max_changes: u32,
        per_change_fee: Amount,
        recovery_fee: Amount,
    ) -> Self {
        Self {
            free_changes_threshold,
            max_changes,
            per_change_fee,
            recovery_fee,
        }
    }

    /// Validate internal consistency of the thresholds.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_changes == 0 {
            return Err("max_changes must be at least 1".to_string());
        }
        if self.free_changes_threshold > self.max_changes {
            return Err(format!(
                "free_changes_threshold ({}) exceeds max_changes ({})",
                self.free_changes_threshold, self.max_changes
            ));
        }
        Ok(())
    }

    /// Evaluate the policy for one rotation attempt.
    ///
    /// Pure and deterministic: the decision depends only on the counters
    /// passed in, never on wall-clock time or stored state.
    ///
    /// `WillBlock` covers the degenerate case of an unblocked record whose
    /// counter already sits at the cap (possible after a crash between the
    /// counter write and the flag write): the attempt is charged like a
    /// normal paid rotation and the record blocks when it completes. In
    /// the common path the counter crossing the cap during mutation is
    /// what sets the flag.
    pub fn evaluate(&self, change_count: u32, is_blocked: bool) -> Decision {
        if is_blocked {
            return Decision::Blocked;
        }
        if change_count < self.free_changes_threshold {
            return Decision::Free;
        }
        if change_count < self.max_changes {
            return Decision::Chargeable {
                fee: self.per_change_fee,
            };
        }
        Decision::WillBlock {
            fee: self.per_change_fee,
        }
    }
}

/// Per-channel policy configuration.
///
/// Channels share the default policy unless their fees diverge, in which
/// case an override is registered per channel id. This keeps the policy as
/// data: adding a channel never duplicates the state machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Policy applied to channels without a specific override.
    pub default_policy: RotationPolicy,
    /// Per-channel policy overrides.
    pub channel_policies: HashMap<String, RotationPolicy>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_policy: RotationPolicy::default(),
            channel_policies: HashMap::new(),
        }
    }
}

impl PolicyConfig {
    /// Get the policy for a specific channel.
    pub fn policy_for(&self, channel: &Channel) -> &RotationPolicy {
        self.channel_policies
            .get(channel.as_str())
            .unwrap_or(&self.default_policy)
    }

    /// Set a policy override for a specific channel.
    pub fn set_policy(mut self, channel: Channel, policy: RotationPolicy) -> Self {
        self.channel_policies.insert(channel.0, policy);
        self
    }

    /// Validate the default policy and every override.
    pub fn validate(&self) -> Result<(), String> {
        self.default_policy.validate()?;
        for (channel, policy) in &self.channel_policies {
            policy
                .validate()
                .map_err(|e| format!("channel {}: {}", channel, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> RotationPolicy {
        RotationPolicy::new(
            3,
            12,
            Amount::from_minor_units(1649),
            Amount::from_minor_units(34900),
        )
    }

    #[test]
    fn test_free_tier() {
        let policy = test_policy();
        assert_eq!(policy.evaluate(0, false), Decision::Free);
        assert_eq!(policy.evaluate(1, false), Decision::Free);
        assert_eq!(policy.evaluate(2, false), Decision::Free);
    }

    #[test]
    fn test_chargeable_tier() {
        let policy = test_policy();
        let expected = Decision::Chargeable {
            fee: Amount::from_minor_units(1649),
        };
        assert_eq!(policy.evaluate(3, false), expected);
        assert_eq!(policy.evaluate(10, false), expected);
        // The final admissible rotation is still a plain charge; the block
        // comes from the counter crossing the cap when it completes.
        assert_eq!(policy.evaluate(11, false), expected);
    }

    #[test]
    fn test_counter_at_cap_will_block() {
        let policy = test_policy();
        let decision = policy.evaluate(12, false);
        assert_eq!(
            decision,
            Decision::WillBlock {
                fee: Amount::from_minor_units(1649)
            }
        );
        assert!(decision.will_block());
        assert_eq!(decision.fee().as_minor_units(), 1649);
    }

    #[test]
    fn test_blocked_flag_wins() {
        let policy = test_policy();
        assert_eq!(policy.evaluate(12, true), Decision::Blocked);
        // The flag is authoritative even if the counter looks fine.
        assert_eq!(policy.evaluate(0, true), Decision::Blocked);
        assert!(!policy.evaluate(0, true).is_allowed());
    }

    #[test]
    fn test_decision_fee_accessor() {
        assert!(Decision::Free.fee().is_zero());
        assert!(Decision::Blocked.fee().is_zero());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let policy = RotationPolicy::new(13, 12, Amount::zero(), Amount::zero());
        assert!(policy.validate().is_err());

        let policy = RotationPolicy::new(0, 0, Amount::zero(), Amount::zero());
        assert!(policy.validate().is_err());

        assert!(test_policy().validate().is_ok());
    }

    #[test]
    fn test_config_per_channel_override() {
        let pricier = RotationPolicy::new(
            2,
            8,
            Amount::from_minor_units(2999),
            Amount::from_minor_units(49900),
        );
        let config = PolicyConfig::default().set_policy(Channel::ceres(), pricier.clone());

        assert_eq!(config.policy_for(&Channel::ceres()), &pricier);
        assert_eq!(
            config.policy_for(&Channel::atlas()),
            &RotationPolicy::default()
        );
        assert!(config.validate().is_ok());
    }
}
