//! Inspect and fund the simulated billing wallet.

use anyhow::{Context, Result};
use credkit_lib::Amount;
use std::path::Path;

use crate::ui;
use crate::wallet::WalletBillingGateway;

pub async fn show(storage_dir: &Path, _verbose: bool) -> Result<()> {
    ui::header("Billing Wallet");

    let gateway = WalletBillingGateway::open(super::wallet_path(storage_dir))?;
    let balance = gateway.balance()?;
    ui::key_value("Balance", &format!("{} minor units", balance));

    Ok(())
}

pub async fn topup(storage_dir: &Path, amount: &str, _verbose: bool) -> Result<()> {
    ui::header("Wallet Top-up");

    let amount = Amount::from_str_checked(amount)
        .map_err(|e| anyhow::anyhow!(e))
        .context("amount must be an integer count of minor units")?;

    let gateway = WalletBillingGateway::open(super::wallet_path(storage_dir))?;
    let balance = gateway.topup(amount)?;

    ui::success("Wallet funded");
    ui::key_value("New balance", &format!("{} minor units", balance));

    Ok(())
}
