//! Filesystem adapters for StockCoach.
//!
//! Data directory resolution and the JSON-file implementation of the
//! `KvStore` port used as the local cache.

pub mod cache;

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "STOCKCOACH_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `STOCKCOACH_DATA_DIR` environment variable
/// 2. `~/.stockcoach`
/// 3. `./.stockcoach`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".stockcoach");
    }

    PathBuf::from(".stockcoach")
}
