//! Rentnest Store - durable key/value storage for the session engine
//!
//! Every piece of session state the client keeps between launches goes
//! through the [`KeyValueStore`] trait: string keys, string values, each
//! operation independently durable. Two backends are provided:
//!
//! - **SqliteKeyValueStore**: Sea-ORM over SQLite, one `kv_store` table
//! - **MemoryKeyValueStore**: process-local map with fault injection
//!
//! # Database Schema
//!
//! - `kv_store`: `key` (primary key), `value`, `updated_at` (unix millis)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use rentnest_store::{KeyValueStore, SqliteKeyValueStore, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteKeyValueStore::open(&StoreConfig::default()).await?;
//! store.set("access_token", "t1").await?;
//! assert_eq!(store.get("access_token").await?.as_deref(), Some("t1"));
//! # Ok(())
//! # }
//! ```

pub mod entities;
pub mod error;
pub mod kv_store;
pub mod memory_store;
pub mod migration;
pub mod sqlite_store;

pub use error::{Result, StorageError};
pub use kv_store::KeyValueStore;
pub use memory_store::{MemoryKeyValueStore, StoreOp};
pub use sqlite_store::SqliteKeyValueStore;

/// Configuration for the persistence layer
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: std::path::PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::path::PathBuf::from("rentnest.db"),
        }
    }
}
