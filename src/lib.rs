//! Vice Bank Core
//!
//! Token-ledger and deposit-accounting engine shared by the action bank and
//! vice bank domains: entities, the generic in-memory ledger store, the
//! file-backed decorator with corrupt-file recovery, and the durable-write
//! primitive underneath it. The HTTP layer and database adapters live
//! elsewhere and consume these stores through the contracts in [`stores`].

pub mod config;
pub mod errors;
pub mod file_service;
pub mod models;
pub mod stores;

pub use config::Config;
pub use errors::AppError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the hosting process. Respects `RUST_LOG`, falling
/// back to `log_level`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
