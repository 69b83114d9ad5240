//! Property-based tests for the rotation policy

use credkit_lib::policy::{Decision, RotationPolicy};
use credkit_lib::Amount;
use proptest::prelude::*;

fn arb_policy() -> impl Strategy<Value = RotationPolicy> {
    (0u32..=20, 1u32..=40, 0i64..100_000, 0i64..500_000).prop_filter_map(
        "free tier must fit under the cap",
        |(free, max, fee, recovery)| {
            if free > max {
                return None;
            }
            Some(RotationPolicy::new(
                free,
                max,
                Amount::from_minor_units(fee),
                Amount::from_minor_units(recovery),
            ))
        },
    )
}

proptest! {
    /// A blocked record always evaluates to Blocked, whatever the counter says.
    #[test]
    fn blocked_flag_always_wins(policy in arb_policy(), count in 0u32..100) {
        prop_assert_eq!(policy.evaluate(count, true), Decision::Blocked);
    }

    /// Every counter under the free threshold is free.
    #[test]
    fn free_tier_is_free(policy in arb_policy(), seed in 0u32..1000) {
        prop_assume!(policy.free_changes_threshold > 0);
        let count = seed % policy.free_changes_threshold;
        prop_assert_eq!(policy.evaluate(count, false), Decision::Free);
    }

    /// Every counter between the free threshold and the cap is chargeable
    /// at exactly the per-change fee.
    #[test]
    fn paid_tier_charges_the_configured_fee(policy in arb_policy(), seed in 0u32..1000) {
        let width = policy.max_changes - policy.free_changes_threshold;
        prop_assume!(width > 0);
        let count = policy.free_changes_threshold + seed % width;
        let decision = policy.evaluate(count, false);
        prop_assert_eq!(decision, Decision::Chargeable { fee: policy.per_change_fee });
        prop_assert_eq!(decision.fee(), policy.per_change_fee);
    }

    /// The decision never invents a fee: it is either zero or the
    /// configured per-change fee.
    #[test]
    fn fee_is_zero_or_configured(policy in arb_policy(), count in 0u32..100, blocked: bool) {
        let fee = policy.evaluate(count, blocked).fee();
        prop_assert!(fee.is_zero() || fee == policy.per_change_fee);
    }

    /// Evaluation is deterministic.
    #[test]
    fn evaluation_is_deterministic(policy in arb_policy(), count in 0u32..100, blocked: bool) {
        prop_assert_eq!(
            policy.evaluate(count, blocked),
            policy.evaluate(count, blocked)
        );
    }
}
