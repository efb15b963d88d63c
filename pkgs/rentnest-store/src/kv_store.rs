//! The storage contract every session component writes through.

use async_trait::async_trait;

use crate::Result;

/// Durable string-to-string store that survives process restarts.
///
/// Operations are individually durable. Nothing is atomic across keys: a
/// caller that writes several keys must tolerate a crash between any two of
/// them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written or was removed.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove one key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every listed key.
    async fn remove_all(&self, keys: &[&str]) -> Result<()>;

    /// Drop every entry in the store.
    async fn clear(&self) -> Result<()>;
}
