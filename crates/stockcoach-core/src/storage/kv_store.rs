//! Key-value store trait.
//!
//! Defines the interface of the local cache: one JSON value per
//! `(namespace, key)`. The chat core keeps two namespaces in it, the
//! per-user message snapshot and the per-user geo/timezone record.

use stockcoach_types::error::RepositoryError;

/// Trait for namespaced key-value persistent storage.
///
/// Writes are full overwrites of the previous value (last writer wins).
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in stockcoach-infra.
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    ///
    /// A stored value that cannot be decoded is an error, not `None`.
    fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>>
    + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if key does not exist.
    fn delete(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
