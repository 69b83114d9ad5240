//! Recover a locked-out credential by paying the recovery fee.

use anyhow::Result;
use credkit_lib::{AccountId, Channel, CredkitError};
use std::path::Path;

use crate::ui;

pub async fn run(
    storage_dir: &Path,
    account: &str,
    channel: &str,
    request_id: Option<String>,
    yes: bool,
    _verbose: bool,
) -> Result<()> {
    ui::header("Recover Access");

    let service = super::build_service(storage_dir)?;
    let account = AccountId::from(account);
    let channel = Channel::from(channel);

    let fee = service.policy_for(&channel).recovery_fee;
    ui::warning(&format!("Recovery costs {} minor units.", fee));
    if !yes && !ui::confirm("Proceed with the paid recovery?", false)? {
        ui::info("Recovery cancelled");
        return Ok(());
    }

    let request_id = request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ui::key_value("Request id", &request_id);

    let pb = ui::spinner("Recovering access...");
    let outcome = service
        .recover_access(&account, &channel, &request_id)
        .await;
    pb.finish_and_clear();

    match outcome {
        Ok(result) => {
            ui::success(&format!("Access recovered on {}", channel));
            ui::key_value("New access code", result.new_code.reveal());
            ui::info("The rotation counter was reset; you have a fresh free tier.");
            Ok(())
        }
        Err(CredkitError::NotBlocked { .. }) => {
            ui::warning("This credential is not locked out; use `rotate` instead.");
            ui::info("Nothing was charged.");
            Ok(())
        }
        Err(CredkitError::PaymentFailed { reason }) => {
            ui::error(&format!("Payment declined: {}", reason));
            ui::info("The credential stays locked. Top up the wallet and retry.");
            Ok(())
        }
        Err(CredkitError::PaymentUnknown { .. }) => {
            ui::warning("The payment outcome is unknown: you may or may not have been charged.");
            ui::info(&format!(
                "Retry with the SAME request id to resolve it safely: \
                 credkit-demo recover {} --channel {} --request-id {}",
                account, channel, request_id
            ));
            Ok(())
        }
        Err(e) => {
            ui::error(&e.to_string());
            Err(e.into())
        }
    }
}
