//! Show credential status for one channel or all of an account's channels.

use anyhow::Result;
use credkit_lib::{AccountId, Channel};
use credkit_rotations::CredentialStatus;
use std::path::Path;

use crate::ui;

pub async fn run(
    storage_dir: &Path,
    account: &str,
    channel: Option<String>,
    verbose: bool,
) -> Result<()> {
    ui::header("Credential Status");

    let service = super::build_service(storage_dir)?;
    let account = AccountId::from(account);

    let statuses: Vec<(Channel, CredentialStatus)> = match channel {
        Some(channel) => {
            let channel = Channel::from(channel);
            let status = service.get_status(&account, &channel).await?;
            vec![(channel, status)]
        }
        None => {
            let statuses = service.list_statuses(&account).await?;
            if statuses.is_empty() {
                ui::info(&format!(
                    "No channels onboarded for {}; run `onboard` first",
                    account
                ));
                return Ok(());
            }
            statuses
        }
    };

    for (channel, status) in statuses {
        let policy = service.policy_for(&channel);
        ui::key_value("Channel", channel.as_str());
        if verbose {
            ui::key_value("Access code", status.current_code.reveal());
        }
        ui::key_value(
            "Rotations used",
            &format!("{} of {}", status.change_count, policy.max_changes),
        );

        if status.is_blocked {
            ui::warning(&format!(
                "Locked out; recovery costs {} minor units",
                policy.recovery_fee
            ));
        } else if status.is_chargeable_next {
            ui::key_value(
                "Next rotation",
                &format!("paid ({} minor units)", policy.per_change_fee),
            );
        } else {
            let free_left = policy.free_changes_threshold - status.change_count;
            ui::key_value("Next rotation", &format!("free ({} free left)", free_left));
        }
        ui::separator();
    }

    Ok(())
}
