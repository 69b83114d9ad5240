//! Credential persistence
//!
//! Storage is trait-based so the engine can run against anything from an
//! in-memory map (tests) to a file tree (demo CLI) to a real database. The
//! contract every implementation must honor is the version check on
//! [`CredentialStore::save`]: a write only lands if the caller saw the
//! latest version, otherwise the attempt fails with
//! `PersistenceConflict` and must re-read. That check is what makes the
//! read-evaluate-charge-write sequence safe against a concurrent writer the
//! in-process lock table cannot see (another process on the same files).

use crate::record::CredentialRecord;
use async_trait::async_trait;
use credkit_lib::{AccountId, Channel, CredkitError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Storage trait for credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the record for (account, channel), if any.
    async fn load(&self, account: &AccountId, channel: &Channel)
        -> Result<Option<CredentialRecord>>;

    /// Persist a brand-new record.
    ///
    /// Fails with `AlreadyOnboarded` if a record exists for the same
    /// (account, channel). Returns the stored record (version 1).
    async fn insert(&self, record: &CredentialRecord) -> Result<CredentialRecord>;

    /// Persist a mutation under a version check.
    ///
    /// The write succeeds only if the stored version equals
    /// `record.version`; the stored version is then bumped. Returns the
    /// stored record so callers observe the new version.
    ///
    /// # Errors
    ///
    /// `PersistenceConflict` if another writer got there first;
    /// `NotFound` if the record vanished.
    async fn save(&self, record: &CredentialRecord) -> Result<CredentialRecord>;

    /// List every credential record for an account (for display).
    async fn list(&self, account: &AccountId) -> Result<Vec<CredentialRecord>>;
}

/// In-memory credential store.
///
/// Thread-safe map keyed by (account, channel). Used by tests and as the
/// backing store for short-lived tooling; the version discipline matches
/// the file store exactly.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<(String, String), CredentialRecord>>,
}

impl MemoryCredentialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(account: &AccountId, channel: &Channel) -> (String, String) {
        (account.as_str().to_string(), channel.as_str().to_string())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(
        &self,
        account: &AccountId,
        channel: &Channel,
    ) -> Result<Option<CredentialRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&Self::key(account, channel)).cloned())
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let key = Self::key(&record.account_id, &record.channel);
        if records.contains_key(&key) {
            return Err(CredkitError::AlreadyOnboarded {
                channel: record.channel.to_string(),
            });
        }
        let mut stored = record.clone();
        stored.version = 1;
        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn save(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let key = Self::key(&record.account_id, &record.channel);
        let current = records.get(&key).ok_or_else(|| {
            CredkitError::not_found(record.account_id.as_str(), record.channel.as_str())
        })?;

        if current.version != record.version {
            return Err(CredkitError::PersistenceConflict {
                account: record.account_id.to_string(),
                channel: record.channel.to_string(),
            });
        }

        let mut stored = record.clone();
        stored.version = record.version + 1;
        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list(&self, account: &AccountId) -> Result<Vec<CredentialRecord>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .values()
            .filter(|r| &r.account_id == account)
            .cloned()
            .collect())
    }
}

/// File-based credential store.
///
/// One pretty-printed JSON file per (account, channel) under
/// `credentials/`. Mutations take an exclusive fs2 lock on the record file
/// for the whole read-check-write, so concurrent processes serialize on
/// the same record while leaving other records untouched.
pub struct FileCredentialStore {
    base_path: PathBuf,
}

impl FileCredentialStore {
    /// Create the store rooted at `base_path`.
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(base_path.join("credentials"))?;
        Ok(Self { base_path })
    }

    fn record_path(&self, account: &AccountId, channel: &Channel) -> PathBuf {
        self.base_path
            .join("credentials")
            .join(format!("{}__{}.json", account, channel))
    }

    fn read_record(path: &PathBuf) -> Result<Option<CredentialRecord>> {
        if !path.exists() || std::fs::metadata(path)?.len() == 0 {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write_record(path: &PathBuf, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(
        &self,
        account: &AccountId,
        channel: &Channel,
    ) -> Result<Option<CredentialRecord>> {
        Self::read_record(&self.record_path(account, channel))
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        use fs2::FileExt;
        use std::fs::OpenOptions;

        let path = self.record_path(&record.account_id, &record.channel);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        let result = (|| {
            if Self::read_record(&path)?.is_some() {
                return Err(CredkitError::AlreadyOnboarded {
                    channel: record.channel.to_string(),
                });
            }
            let mut stored = record.clone();
            stored.version = 1;
            Self::write_record(&path, &stored)?;
            Ok(stored)
        })();

        file.unlock()?;
        result
    }

    async fn save(&self, record: &CredentialRecord) -> Result<CredentialRecord> {
        use fs2::FileExt;
        use std::fs::OpenOptions;

        let path = self.record_path(&record.account_id, &record.channel);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;

        let result = (|| {
            let current = Self::read_record(&path)?.ok_or_else(|| {
                CredkitError::not_found(record.account_id.as_str(), record.channel.as_str())
            })?;

            if current.version != record.version {
                return Err(CredkitError::PersistenceConflict {
                    account: record.account_id.to_string(),
                    channel: record.channel.to_string(),
                });
            }

            let mut stored = record.clone();
            stored.version = record.version + 1;
            Self::write_record(&path, &stored)?;
            Ok(stored)
        })();

        file.unlock()?;
        result
    }

    async fn list(&self, account: &AccountId) -> Result<Vec<CredentialRecord>> {
        let dir = self.base_path.join("credentials");
        let mut result = Vec::new();
        if !dir.exists() {
            return Ok(result);
        }

        let prefix = format!("{}__", account);
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !name.starts_with(&prefix) {
                continue;
            }
            if let Some(record) = Self::read_record(&path)? {
                result.push(record);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_record() -> CredentialRecord {
        CredentialRecord::onboard(AccountId::from("acct_1"), Channel::atlas())
    }

    #[tokio::test]
    async fn test_memory_insert_and_load() {
        let store = MemoryCredentialStore::new();
        let record = test_record();

        let stored = store.insert(&record).await.unwrap();
        assert_eq!(stored.version, 1);

        let loaded = store
            .load(&record.account_id, &record.channel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.current_code, record.current_code);
    }

    #[tokio::test]
    async fn test_memory_double_insert_rejected() {
        let store = MemoryCredentialStore::new();
        let record = test_record();

        store.insert(&record).await.unwrap();
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, CredkitError::AlreadyOnboarded { .. }));
    }

    #[tokio::test]
    async fn test_memory_save_bumps_version() {
        let store = MemoryCredentialStore::new();
        let mut record = store.insert(&test_record()).await.unwrap();

        record.apply_rotation(credkit_lib::AccessCode::generate(), 12);
        let stored = store.save(&record).await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.change_count, 1);
    }

    #[tokio::test]
    async fn test_memory_save_detects_conflict() {
        let store = MemoryCredentialStore::new();
        let record = store.insert(&test_record()).await.unwrap();

        // Two readers load the same version; the second save must fail.
        let mut first = record.clone();
        let mut second = record.clone();

        first.apply_rotation(credkit_lib::AccessCode::generate(), 12);
        store.save(&first).await.unwrap();

        second.apply_rotation(credkit_lib::AccessCode::generate(), 12);
        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(err, CredkitError::PersistenceConflict { .. }));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf()).unwrap();
        let record = test_record();

        let stored = store.insert(&record).await.unwrap();
        assert_eq!(stored.version, 1);

        let loaded = store
            .load(&record.account_id, &record.channel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.account_id, record.account_id);
        assert_eq!(loaded.current_code, record.current_code);
    }

    #[tokio::test]
    async fn test_file_store_conflict_detection() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf()).unwrap();
        let record = store.insert(&test_record()).await.unwrap();

        let mut first = record.clone();
        let mut second = record.clone();

        first.apply_rotation(credkit_lib::AccessCode::generate(), 12);
        store.save(&first).await.unwrap();

        second.apply_rotation(credkit_lib::AccessCode::generate(), 12);
        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(err, CredkitError::PersistenceConflict { .. }));
    }

    #[tokio::test]
    async fn test_file_store_list_by_account() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf()).unwrap();

        let acct = AccountId::from("acct_1");
        store
            .insert(&CredentialRecord::onboard(acct.clone(), Channel::atlas()))
            .await
            .unwrap();
        store
            .insert(&CredentialRecord::onboard(acct.clone(), Channel::ceres()))
            .await
            .unwrap();
        store
            .insert(&CredentialRecord::onboard(
                AccountId::from("acct_2"),
                Channel::atlas(),
            ))
            .await
            .unwrap();

        let listed = store.list(&acct).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.account_id == acct));
    }
}
