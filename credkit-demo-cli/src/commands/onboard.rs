//! Onboard an account to a channel, issuing its first credential.

use anyhow::Result;
use credkit_lib::{AccountId, Channel, CredkitError};
use std::path::Path;

use crate::ui;

pub async fn run(storage_dir: &Path, account: &str, channel: &str, _verbose: bool) -> Result<()> {
    ui::header("Onboard Channel");

    let service = super::build_service(storage_dir)?;
    let account = AccountId::from(account);
    let channel = Channel::from(channel);

    match service.onboard(&account, &channel).await {
        Ok(status) => {
            ui::success(&format!(
                "Issued credential for {} on {}",
                account, channel
            ));
            ui::key_value("Access code", status.current_code.reveal());
            ui::info("Store this code in your integration; rotate it any time.");
            Ok(())
        }
        Err(CredkitError::AlreadyOnboarded { .. }) => {
            ui::warning(&format!(
                "{} is already onboarded to {}; use `status` to see the current credential",
                account, channel
            ));
            Ok(())
        }
        Err(e) => {
            ui::error(&e.to_string());
            Err(e.into())
        }
    }
}
