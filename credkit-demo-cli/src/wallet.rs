//! Simulated billing wallet backed by a JSON file.
//!
//! Stands in for the real billing ledger during demos: a balance plus a
//! map of settled outcomes keyed by idempotency key, so replayed charges
//! return their original outcome without touching the balance, the same
//! contract the engine expects from production billing.

use async_trait::async_trait;
use credkit_lib::{AccountId, Amount};
use credkit_rotations::{BillingGateway, ChargeOutcome, GatewayError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
enum SettledOutcome {
    Approved,
    Declined { message: String },
}

impl From<&SettledOutcome> for ChargeOutcome {
    fn from(settled: &SettledOutcome) -> Self {
        match settled {
            SettledOutcome::Approved => ChargeOutcome::Approved,
            SettledOutcome::Declined { message } => ChargeOutcome::Declined {
                message: message.clone(),
            },
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct WalletFile {
    balance: Amount,
    settled: HashMap<String, SettledOutcome>,
}

/// File-persisted billing gateway for the demo CLI.
pub struct WalletBillingGateway {
    path: PathBuf,
}

impl WalletBillingGateway {
    /// Open (or create) the wallet file at `path`.
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn load(&self) -> anyhow::Result<WalletFile> {
        if !self.path.exists() || std::fs::metadata(&self.path)?.len() == 0 {
            return Ok(WalletFile::default());
        }
        let json = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn save(&self, wallet: &WalletFile) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(wallet)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Current wallet balance.
    pub fn balance(&self) -> anyhow::Result<Amount> {
        Ok(self.load()?.balance)
    }

    /// Add funds to the wallet.
    pub fn topup(&self, amount: Amount) -> anyhow::Result<Amount> {
        use fs2::FileExt;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let result = (|| {
            let mut wallet = self.load()?;
            wallet.balance = wallet
                .balance
                .checked_add(&amount)
                .ok_or_else(|| anyhow::anyhow!("balance overflow"))?;
            self.save(&wallet)?;
            Ok(wallet.balance)
        })();

        file.unlock()?;
        result
    }
}

#[async_trait]
impl BillingGateway for WalletBillingGateway {
    async fn consume(
        &self,
        _account: &AccountId,
        amount: Amount,
        _reason_code: &str,
        idempotency_key: &str,
    ) -> Result<ChargeOutcome, GatewayError> {
        use fs2::FileExt;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        file.lock_exclusive()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let result = (|| {
            let mut wallet = self
                .load()
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            // Replay: a settled key never touches the balance again.
            if let Some(settled) = wallet.settled.get(idempotency_key) {
                return Ok(settled.into());
            }

            let outcome = if amount.is_covered_by(&wallet.balance) {
                wallet.balance = wallet
                    .balance
                    .checked_sub(&amount)
                    .unwrap_or_else(Amount::zero);
                SettledOutcome::Approved
            } else {
                SettledOutcome::Declined {
                    message: format!(
                        "insufficient funds: need {}, have {}",
                        amount, wallet.balance
                    ),
                }
            };
            let charge = (&outcome).into();
            wallet.settled.insert(idempotency_key.to_string(), outcome);
            self.save(&wallet)
                .map_err(|e| GatewayError::Transport(e.to_string()))?;
            Ok(charge)
        })();

        let _ = file.unlock();
        result
    }
}
