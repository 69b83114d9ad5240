//! CLI command implementations

pub mod onboard;
pub mod recover;
pub mod rotate;
pub mod status;
pub mod wallet;

use crate::wallet::WalletBillingGateway;
use credkit_rotations::{
    FileAttemptJournal, FileCredentialStore, PolicyConfig, RotationService,
};
use std::path::Path;
use std::sync::Arc;

/// Path of the simulated billing wallet inside the storage dir.
pub(crate) fn wallet_path(storage_dir: &Path) -> std::path::PathBuf {
    storage_dir.join("wallet.json")
}

/// Wire the engine against file storage and the simulated wallet.
pub(crate) fn build_service(storage_dir: &Path) -> anyhow::Result<RotationService> {
    let store = Arc::new(FileCredentialStore::new(storage_dir.to_path_buf())?);
    let journal = Arc::new(FileAttemptJournal::new(storage_dir.to_path_buf())?);
    let gateway = Arc::new(WalletBillingGateway::open(wallet_path(storage_dir))?);
    Ok(RotationService::new(
        store,
        gateway,
        journal,
        PolicyConfig::default(),
    )?)
}
