//! File-backed store decorators.
//!
//! Composition, not inheritance: each file store holds the in-memory engine
//! plus a writer, calls through, then rewrites the whole aggregate to disk.
//! If the in-memory call fails nothing is written; if the write fails the
//! error propagates after the in-memory mutation has already committed, so
//! the two views can diverge until the next successful write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::FixedOffset;
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::AppError;
use crate::file_service::FileWriter;
use crate::models::{Frequency, ViceBankUser};

use super::memory::{MemoryLedgerStore, MemoryUserStore};
use super::{
    EntryMutation, EntryQuery, LedgerEntry, LedgerRule, LedgerStore, PageOptions, StoreEntity,
    UserStore,
};

/// How a ledger aggregate maps onto files.
pub enum FileLayout {
    /// One JSON object `{"actions": [...], "deposits": [...]}` (vice bank).
    Combined { file: FileWriter },
    /// Two bare-array files, rules and entries (action bank).
    Split {
        rules_file: FileWriter,
        entries_file: FileWriter,
    },
}

impl FileLayout {
    pub fn combined(name: &str) -> Self {
        FileLayout::Combined {
            file: FileWriter::new(name, "json"),
        }
    }

    pub fn split(rules_name: &str, entries_name: &str) -> Self {
        FileLayout::Split {
            rules_file: FileWriter::new(rules_name, "json"),
            entries_file: FileWriter::new(entries_name, "json"),
        }
    }
}

/// Parse every element of a JSON array through the entity's strict parser,
/// dropping the ones that fail with a logged warning.
fn parse_elements<T: StoreEntity>(values: &[Value]) -> Vec<T> {
    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        match T::parse_json(value.clone()) {
            Ok(entity) => parsed.push(entity),
            Err(err) => warn!("discarding invalid {} entry: {}", T::KIND, err),
        }
    }
    parsed
}

fn array_json<T: StoreEntity>(items: &[T]) -> String {
    Value::Array(items.iter().map(|item| item.to_json()).collect()).to_string()
}

/// Load a bare-array file, recovering from corruption by backing up the raw
/// bytes and resetting the primary file to `[]`.
async fn load_array<T: StoreEntity>(dir: &Path, file: &FileWriter) -> Vec<T> {
    let raw = match file.read_file(dir, None).await {
        Ok(raw) => raw,
        Err(err) => {
            // nothing was read, so there is nothing to back up
            warn!("failed to read {}: {}", file.file_name(), err);
            if let Err(clear_err) = file.clear_file(dir, None).await {
                warn!("failed to initialize {}: {}", file.file_name(), clear_err);
            }
            return Vec::new();
        }
    };

    let parsed: Result<Vec<Value>, AppError> = serde_json::from_str::<Value>(&raw)
        .map_err(AppError::from)
        .and_then(|value| match value {
            Value::Array(values) => Ok(values),
            _ => Err(AppError::Validation(format!(
                "{} is not a JSON array",
                file.file_name()
            ))),
        });

    match parsed {
        Ok(values) => parse_elements(&values),
        Err(err) => {
            warn!("corrupt data in {}: {}", file.file_name(), err);
            if !raw.is_empty() {
                if let Err(backup_err) = file.write_backup(dir, &raw, None).await {
                    warn!("failed to back up {}: {}", file.file_name(), backup_err);
                }
            }
            if let Err(clear_err) = file.clear_file(dir, None).await {
                warn!("failed to reset {}: {}", file.file_name(), clear_err);
            }
            Vec::new()
        }
    }
}

/// File-backed ledger store for either bank domain.
pub struct FileLedgerStore<R, E> {
    inner: MemoryLedgerStore<R, E>,
    dir: PathBuf,
    layout: FileLayout,
}

impl<R: LedgerRule, E: LedgerEntry> FileLedgerStore<R, E> {
    /// Load the store from disk. Read and parse failures never propagate:
    /// corrupt data is backed up (best-effort) and the primary file is reset
    /// to an empty valid shape, so boot always succeeds.
    pub async fn init(dir: PathBuf, layout: FileLayout, filter_offset: FixedOffset) -> Self {
        let (rules, entries) = match &layout {
            FileLayout::Combined { file } => Self::load_combined(&dir, file).await,
            FileLayout::Split {
                rules_file,
                entries_file,
            } => (
                load_array::<R>(&dir, rules_file).await,
                load_array::<E>(&dir, entries_file).await,
            ),
        };
        Self {
            inner: MemoryLedgerStore::with_data(rules, entries, filter_offset),
            dir,
            layout,
        }
    }

    async fn load_combined(dir: &Path, file: &FileWriter) -> (Vec<R>, Vec<E>) {
        let raw = match file.read_file(dir, None).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to read {}: {}", file.file_name(), err);
                if let Err(init_err) = file
                    .write_to_file(dir, &Self::combined_json(&[], &[]), None, None)
                    .await
                {
                    warn!("failed to initialize {}: {}", file.file_name(), init_err);
                }
                return (Vec::new(), Vec::new());
            }
        };

        match Self::parse_combined(&raw, file) {
            Ok(pair) => pair,
            Err(err) => {
                warn!("corrupt aggregate in {}: {}", file.file_name(), err);
                if !raw.is_empty() {
                    if let Err(backup_err) = file.write_backup(dir, &raw, None).await {
                        warn!("failed to back up {}: {}", file.file_name(), backup_err);
                    }
                }
                if let Err(reset_err) = file
                    .write_to_file(dir, &Self::combined_json(&[], &[]), None, None)
                    .await
                {
                    warn!("failed to reset {}: {}", file.file_name(), reset_err);
                }
                (Vec::new(), Vec::new())
            }
        }
    }

    fn parse_combined(raw: &str, file: &FileWriter) -> Result<(Vec<R>, Vec<E>), AppError> {
        let value: Value = serde_json::from_str(raw)?;
        let actions = value
            .get("actions")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::Validation(format!("{} is missing an actions array", file.file_name()))
            })?;
        let deposits = value
            .get("deposits")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::Validation(format!("{} is missing a deposits array", file.file_name()))
            })?;
        Ok((parse_elements(actions), parse_elements(deposits)))
    }

    fn combined_json(rules: &[R], entries: &[E]) -> String {
        json!({
            "actions": rules.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
            "deposits": entries.iter().map(|e| e.to_json()).collect::<Vec<_>>(),
        })
        .to_string()
    }

    /// Pre-mutation snapshot, kept only when a partial multi-file write could
    /// need the first file restored.
    fn pre_snapshot(&self) -> Option<(Vec<R>, Vec<E>)> {
        match self.layout {
            FileLayout::Combined { .. } => None,
            FileLayout::Split { .. } => Some(self.inner.snapshot()),
        }
    }

    /// Serialize the entire current aggregate and rewrite the file(s).
    async fn persist(&self, before: Option<&(Vec<R>, Vec<E>)>) -> Result<(), AppError> {
        let (rules, entries) = self.inner.snapshot();
        match &self.layout {
            FileLayout::Combined { file } => {
                file.write_to_file(&self.dir, &Self::combined_json(&rules, &entries), None, None)
                    .await
            }
            FileLayout::Split {
                rules_file,
                entries_file,
            } => {
                rules_file
                    .write_to_file(&self.dir, &array_json(&rules), None, None)
                    .await?;
                if let Err(err) = entries_file
                    .write_to_file(&self.dir, &array_json(&entries), None, None)
                    .await
                {
                    // best-effort restore so the pair stays consistent on disk
                    if let Some((prev_rules, _)) = before {
                        if let Err(restore_err) = rules_file
                            .write_to_file(&self.dir, &array_json(prev_rules), None, None)
                            .await
                        {
                            warn!(
                                "failed to restore {} after partial write: {}",
                                rules_file.file_name(),
                                restore_err
                            );
                        }
                    }
                    return Err(err);
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<R: LedgerRule, E: LedgerEntry> LedgerStore<R, E> for FileLedgerStore<R, E> {
    async fn get_rules(&self, owner_id: &str, opts: &PageOptions) -> Result<Vec<R>, AppError> {
        self.inner.get_rules(owner_id, opts).await
    }

    async fn add_rule(&self, rule: R) -> Result<R, AppError> {
        let before = self.pre_snapshot();
        let stored = self.inner.add_rule(rule).await?;
        self.persist(before.as_ref()).await?;
        Ok(stored)
    }

    async fn update_rule(&self, rule: R) -> Result<R, AppError> {
        let before = self.pre_snapshot();
        let previous = self.inner.update_rule(rule).await?;
        self.persist(before.as_ref()).await?;
        Ok(previous)
    }

    async fn delete_rule(&self, id: &str) -> Result<R, AppError> {
        let before = self.pre_snapshot();
        let removed = self.inner.delete_rule(id).await?;
        self.persist(before.as_ref()).await?;
        Ok(removed)
    }

    async fn get_entries(&self, query: &EntryQuery) -> Result<Vec<E>, AppError> {
        self.inner.get_entries(query).await
    }

    async fn add_entry(&self, entry: E) -> Result<EntryMutation<E>, AppError> {
        let before = self.pre_snapshot();
        let mutation = self.inner.add_entry(entry).await?;
        self.persist(before.as_ref()).await?;
        Ok(mutation)
    }

    async fn update_entry(&self, entry: E) -> Result<EntryMutation<E>, AppError> {
        let before = self.pre_snapshot();
        let mutation = self.inner.update_entry(entry).await?;
        self.persist(before.as_ref()).await?;
        Ok(mutation)
    }

    async fn delete_entry(&self, id: &str) -> Result<EntryMutation<E>, AppError> {
        let before = self.pre_snapshot();
        let mutation = self.inner.delete_entry(id).await?;
        self.persist(before.as_ref()).await?;
        Ok(mutation)
    }

    async fn entries_for_frequency(
        &self,
        entry: &E,
        frequency: Frequency,
    ) -> Result<Vec<E>, AppError> {
        self.inner.entries_for_frequency(entry, frequency).await
    }

    async fn backup(&self) -> Result<(), AppError> {
        let (rules, entries) = self.inner.snapshot();
        match &self.layout {
            FileLayout::Combined { file } => {
                file.write_backup(&self.dir, &Self::combined_json(&rules, &entries), None)
                    .await?;
            }
            FileLayout::Split {
                rules_file,
                entries_file,
            } => {
                rules_file
                    .write_backup(&self.dir, &array_json(&rules), None)
                    .await?;
                entries_file
                    .write_backup(&self.dir, &array_json(&entries), None)
                    .await?;
            }
        }
        Ok(())
    }
}

/// File-backed vice bank user store.
pub struct FileUserStore {
    inner: MemoryUserStore,
    dir: PathBuf,
    file: FileWriter,
}

impl FileUserStore {
    /// Load the store from disk with the same corruption recovery as the
    /// ledger stores.
    pub async fn init(dir: PathBuf, file: FileWriter) -> Self {
        let users = load_array::<ViceBankUser>(&dir, &file).await;
        Self {
            inner: MemoryUserStore::with_data(users),
            dir,
            file,
        }
    }

    async fn persist(&self) -> Result<(), AppError> {
        let users = self.inner.snapshot();
        self.file
            .write_to_file(&self.dir, &array_json(&users), None, None)
            .await
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn get_users(
        &self,
        user_id: &str,
        opts: &PageOptions,
    ) -> Result<Vec<ViceBankUser>, AppError> {
        self.inner.get_users(user_id, opts).await
    }

    async fn get_user(&self, id: &str) -> Result<ViceBankUser, AppError> {
        self.inner.get_user(id).await
    }

    async fn add_user(&self, user: ViceBankUser) -> Result<ViceBankUser, AppError> {
        let stored = self.inner.add_user(user).await?;
        self.persist().await?;
        Ok(stored)
    }

    async fn update_user(&self, user: ViceBankUser) -> Result<ViceBankUser, AppError> {
        let previous = self.inner.update_user(user).await?;
        self.persist().await?;
        Ok(previous)
    }

    async fn delete_user(&self, id: &str) -> Result<ViceBankUser, AppError> {
        let removed = self.inner.delete_user(id).await?;
        self.persist().await?;
        Ok(removed)
    }

    async fn backup(&self) -> Result<(), AppError> {
        let users = self.inner.snapshot();
        self.file
            .write_backup(&self.dir, &array_json(&users), None)
            .await?;
        Ok(())
    }
}
