use std::time::Duration;

use crate::error::StoreError;

/// Minimal contract of an expiring key-value service. Only presence and TTL
/// matter; values are never read.
///
/// Implementations are shared by every camera worker, so they must be safe
/// for concurrent use. Network backends are expected to bound each call with
/// a short timeout and report it as [`StoreError::Timeout`].
pub trait TtlStore: Send + Sync {
    /// Create `key` with `ttl` unless it already exists. Returns whether the
    /// key was created.
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Reset the TTL of an existing key. Returns `false`, changing nothing,
    /// when the key is absent or already expired.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Live keys starting with `prefix`.
    fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
