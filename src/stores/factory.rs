//! Store factory: selects the in-memory or file-backed implementation from
//! configuration and hands it out behind the shared contracts.

use std::sync::Arc;

use crate::config::{Config, PersistenceKind};
use crate::file_service::FileWriter;
use crate::models::{Action, Deposit, DepositConversion, TaskDeposit};

use super::file::{FileLayout, FileLedgerStore, FileUserStore};
use super::memory::{MemoryLedgerStore, MemoryUserStore};
use super::{LedgerStore, UserStore};

/// Vice bank ledger: actions and deposits in one combined file.
pub async fn vice_bank_store(config: &Config) -> Arc<dyn LedgerStore<Action, Deposit>> {
    match config.persistence {
        PersistenceKind::Memory => Arc::new(MemoryLedgerStore::with_offset(
            config.default_utc_offset,
        )),
        PersistenceKind::File => Arc::new(
            FileLedgerStore::init(
                config.data_dir.clone(),
                FileLayout::combined("vice_bank"),
                config.default_utc_offset,
            )
            .await,
        ),
    }
}

/// Action bank ledger: conversion rules and task deposits in split files.
pub async fn action_bank_store(
    config: &Config,
) -> Arc<dyn LedgerStore<DepositConversion, TaskDeposit>> {
    match config.persistence {
        PersistenceKind::Memory => Arc::new(MemoryLedgerStore::with_offset(
            config.default_utc_offset,
        )),
        PersistenceKind::File => Arc::new(
            FileLedgerStore::init(
                config.data_dir.clone(),
                FileLayout::split("deposit_conversions", "task_deposits"),
                config.default_utc_offset,
            )
            .await,
        ),
    }
}

/// Vice bank user store.
pub async fn user_store(config: &Config) -> Arc<dyn UserStore> {
    match config.persistence {
        PersistenceKind::Memory => Arc::new(MemoryUserStore::new()),
        PersistenceKind::File => Arc::new(
            FileUserStore::init(
                config.data_dir.clone(),
                FileWriter::new("vice_bank_users", "json"),
            )
            .await,
        ),
    }
}
