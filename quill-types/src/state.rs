//! The persistence protocol: a string-keyed store of JSON values.

use async_trait::async_trait;

use crate::error::StateError;

/// Key-value persistence for conversations and their messages.
///
/// Implementations:
/// - `MemoryStore`: HashMap (testing, ephemeral)
/// - `FsStore`: one JSON file per key (survives restarts)
///
/// The trait is CRUD plus prefix listing. Interpreting the values is the
/// caller's business.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value by key. Returns `None` if the key doesn't exist.
    async fn read(&self, key: &str) -> Result<Option<serde_json::Value>, StateError>;

    /// Write a value. Creates or overwrites.
    async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), StateError>;

    /// Delete a value. No-op if the key doesn't exist.
    async fn delete(&self, key: &str) -> Result<(), StateError>;

    /// List keys starting with `prefix`. Order is unspecified.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StateError>;
}
