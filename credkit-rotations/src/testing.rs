//! Mock collaborators for testing without a real billing ledger.
//!
//! [`MockBillingGateway`] implements the full gateway contract in memory:
//! outcomes settle exactly once per idempotency key and replay from a cache
//! afterwards, so tests (and the demo tooling) exercise the same replay
//! semantics a production ledger must provide. Failure injection covers
//! both indeterminate shapes: the response lost *after* the charge settled,
//! and the outage *before* anything was charged.

use crate::billing::{BillingGateway, ChargeOutcome, GatewayError};
use async_trait::async_trait;
use credkit_lib::{AccountId, Amount};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// In-memory billing gateway with scripted failures.
pub struct MockBillingGateway {
    balance: Mutex<Amount>,
    settled: Mutex<HashMap<String, ChargeOutcome>>,
    charged: Mutex<Amount>,
    calls: AtomicU64,
    // Next N calls settle the charge, then lose the response.
    drop_after_charge: AtomicU64,
    // Next N calls fail before anything is charged.
    fail_before_charge: AtomicU64,
}

impl MockBillingGateway {
    /// Gateway backed by the given balance.
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance: Mutex::new(balance),
            settled: Mutex::new(HashMap::new()),
            charged: Mutex::new(Amount::zero()),
            calls: AtomicU64::new(0),
            drop_after_charge: AtomicU64::new(0),
            fail_before_charge: AtomicU64::new(0),
        }
    }

    /// Gateway that approves everything.
    pub fn unlimited() -> Self {
        Self::with_balance(Amount::from_minor_units(i64::MAX))
    }

    /// The next `n` calls settle normally but return a transport error, as
    /// if the response was lost after the ledger committed the charge.
    pub fn drop_response_for_next(&self, n: u64) {
        self.drop_after_charge.store(n, Ordering::SeqCst);
    }

    /// The next `n` calls fail before the ledger is touched.
    pub fn fail_before_charge_for_next(&self, n: u64) {
        self.fail_before_charge.store(n, Ordering::SeqCst);
    }

    /// Replace the available balance (simulates a top-up).
    pub fn set_balance(&self, amount: Amount) {
        *self.balance.lock().unwrap_or_else(|e| e.into_inner()) = amount;
    }

    /// Number of `consume` calls observed.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sum of all amounts actually charged (idempotent replays excluded).
    pub fn total_charged(&self) -> Amount {
        *self.charged.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_one(counter: &AtomicU64) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BillingGateway for MockBillingGateway {
    async fn consume(
        &self,
        _account: &AccountId,
        amount: Amount,
        _reason_code: &str,
        idempotency_key: &str,
    ) -> Result<ChargeOutcome, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_one(&self.fail_before_charge) {
            return Err(GatewayError::Transport("injected outage".into()));
        }

        let mut settled = self.settled.lock().unwrap_or_else(|e| e.into_inner());

        // Idempotent replay: a settled key returns the original outcome
        // without touching the balance again.
        if let Some(outcome) = settled.get(idempotency_key) {
            return Ok(outcome.clone());
        }

        let mut balance = self.balance.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = if amount.is_covered_by(&balance) {
            *balance = balance.checked_sub(&amount).unwrap_or(Amount::zero());
            let mut charged = self.charged.lock().unwrap_or_else(|e| e.into_inner());
            *charged = charged.checked_add(&amount).unwrap_or(*charged);
            ChargeOutcome::Approved
        } else {
            ChargeOutcome::Declined {
                message: "insufficient funds".to_string(),
            }
        };
        settled.insert(idempotency_key.to_string(), outcome.clone());

        if Self::take_one(&self.drop_after_charge) {
            return Err(GatewayError::Timeout(5_000));
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settled_key_replays_without_recharging() {
        let gateway = MockBillingGateway::with_balance(Amount::from_minor_units(2000));
        let account = AccountId::from("acct_1");
        let fee = Amount::from_minor_units(1649);

        let first = gateway.consume(&account, fee, "credential.rotate", "key-1").await.unwrap();
        assert_eq!(first, ChargeOutcome::Approved);

        let replay = gateway.consume(&account, fee, "credential.rotate", "key-1").await.unwrap();
        assert_eq!(replay, ChargeOutcome::Approved);

        // Only one real charge despite two calls.
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(gateway.total_charged(), fee);
    }

    #[tokio::test]
    async fn test_decline_settles_too() {
        let gateway = MockBillingGateway::with_balance(Amount::from_minor_units(10));
        let account = AccountId::from("acct_1");
        let fee = Amount::from_minor_units(1649);

        let first = gateway.consume(&account, fee, "credential.rotate", "key-1").await.unwrap();
        assert!(matches!(first, ChargeOutcome::Declined { .. }));

        // The decline replays as well; no charge ever lands.
        let replay = gateway.consume(&account, fee, "credential.rotate", "key-1").await.unwrap();
        assert!(matches!(replay, ChargeOutcome::Declined { .. }));
        assert!(gateway.total_charged().is_zero());
    }

    #[tokio::test]
    async fn test_dropped_response_still_settles_charge() {
        let gateway = MockBillingGateway::unlimited();
        gateway.drop_response_for_next(1);
        let account = AccountId::from("acct_1");
        let fee = Amount::from_minor_units(1649);

        let err = gateway
            .consume(&account, fee, "credential.rotate", "key-1")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        // The ledger committed even though the caller never heard back.
        assert_eq!(gateway.total_charged(), fee);

        let replay = gateway.consume(&account, fee, "credential.rotate", "key-1").await.unwrap();
        assert_eq!(replay, ChargeOutcome::Approved);
        assert_eq!(gateway.total_charged(), fee);
    }

    #[tokio::test]
    async fn test_outage_before_charge_leaves_ledger_untouched() {
        let gateway = MockBillingGateway::unlimited();
        gateway.fail_before_charge_for_next(1);
        let account = AccountId::from("acct_1");
        let fee = Amount::from_minor_units(1649);

        let err = gateway
            .consume(&account, fee, "credential.rotate", "key-1")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert!(gateway.total_charged().is_zero());

        // The retry performs the real charge.
        let outcome = gateway.consume(&account, fee, "credential.rotate", "key-1").await.unwrap();
        assert_eq!(outcome, ChargeOutcome::Approved);
        assert_eq!(gateway.total_charged(), fee);
    }
}
