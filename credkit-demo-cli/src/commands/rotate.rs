//! Rotate the credential for an account on a channel.

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
    ui::header("Rotate Credential");

    let service = super::build_service(storage_dir)?;
    let account = AccountId::from(account);
    let channel = Channel::from(channel);

    let status = service.get_status(&account, &channel).await?;
    if status.is_blocked {
        ui::error("This credential is locked out after too many rotations.");
        ui::info("Run the `recover` command to pay the recovery fee and unblock it.");
        return Ok(());
    }

    if status.is_chargeable_next {
        let fee = service.policy_for(&channel).per_change_fee;
        ui::warning(&format!(
            "The free rotations are used up; this rotation costs {} minor units.",
            fee
        ));
        if !yes && !ui::confirm("Proceed with the paid rotation?", false)? {
            ui::info("Rotation cancelled");
            return Ok(());
        }
    }

    // The request id makes the whole action retry-safe; surfacing it lets
    // the user resolve an unknown payment outcome by retrying with it.
    let request_id = request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    ui::key_value("Request id", &request_id);

    let pb = ui::spinner("Rotating credential...");
    let outcome = service
        .request_rotation(&account, &channel, &request_id)
        .await;
    pb.finish_and_clear();

    match outcome {
        Ok(result) => {
            ui::success(&format!("Credential rotated on {}", channel));
            ui::key_value("New access code", result.new_code.reveal());
            if result.was_charged {
                ui::info("The rotation fee was charged to your wallet.");
            }
            if result.is_blocked {
                ui::warning(
                    "That was the last allowed rotation; the credential is now locked out. \
                     Further changes require the paid recovery flow.",
                );
            }
            Ok(())
        }
        Err(CredkitError::PaymentFailed { reason }) => {
            ui::error(&format!("Payment declined: {}", reason));
            ui::info("Nothing was charged and the credential is unchanged. Top up the wallet and retry.");
            Ok(())
        }
        Err(CredkitError::PaymentUnknown { .. }) => {
            ui::warning("The payment outcome is unknown: you may or may not have been charged.");
            ui::info(&format!(
                "Retry with the SAME request id to resolve it safely: \
                 credkit-demo rotate {} --channel {} --request-id {}",
                account, channel, request_id
            ));
            Ok(())
        }
        Err(CredkitError::Blocked { .. }) => {
            ui::error("This credential is locked out; run `recover` to unblock it.");
            Ok(())
        }
        Err(e) => {
            ui::error(&e.to_string());
            Err(e.into())
        }
    }
}
