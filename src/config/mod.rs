//! Configuration module for the vice bank core.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

use chrono::FixedOffset;

/// Which store implementation the factory hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceKind {
    Memory,
    File,
}

impl PersistenceKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "memory" => Some(PersistenceKind::Memory),
            "file" => Some(PersistenceKind::File),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store implementation selector (memory or file)
    pub persistence: PersistenceKind,
    /// Directory for file-backed stores and their backups
    pub data_dir: PathBuf,
    /// UTC offset anchoring date-only filter strings (America/Chicago
    /// standard time by default)
    pub default_utc_offset: FixedOffset,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let persistence = env::var("VICEBANK_PERSISTENCE")
            .ok()
            .and_then(|s| PersistenceKind::from_str(&s))
            .unwrap_or(PersistenceKind::Memory);

        let data_dir = env::var("VICEBANK_DATA_PATH")
            .unwrap_or_else(|_| "./data".to_string())
            .into();

        let default_utc_offset = env::var("VICEBANK_UTC_OFFSET")
            .unwrap_or_else(|_| "-06:00".to_string())
            .parse()
            .expect("Invalid VICEBANK_UTC_OFFSET format");

        let log_level = env::var("VICEBANK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            persistence,
            data_dir,
            default_utc_offset,
            log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("VICEBANK_PERSISTENCE");
        env::remove_var("VICEBANK_DATA_PATH");
        env::remove_var("VICEBANK_UTC_OFFSET");
        env::remove_var("VICEBANK_LOG_LEVEL");

        let config = Config::from_env();

        assert_eq!(config.persistence, PersistenceKind::Memory);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(
            config.default_utc_offset,
            FixedOffset::west_opt(6 * 3600).unwrap()
        );
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_persistence_kind_parsing() {
        assert_eq!(
            PersistenceKind::from_str("file"),
            Some(PersistenceKind::File)
        );
        assert_eq!(
            PersistenceKind::from_str("memory"),
            Some(PersistenceKind::Memory)
        );
        assert_eq!(PersistenceKind::from_str("mongo"), None);
    }
}
