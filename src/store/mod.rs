//! Backing store seam.
//!
//! The cache treats persistence as an external collaborator behind
//! [`ConfigStore`]: fetch every row, write one entry, delete one key.
//! Schema and transport live on the other side of this trait.

pub mod memory;

use async_trait::async_trait;

use crate::error::ConfigResult;
use crate::snapshot::{ConfigEntry, ConfigSet};

pub use memory::MemoryStore;

/// Result of a full fetch from the backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreLoad {
    /// All persisted rows, flattened to key → value with `.type`/`.desc`
    /// sidecar pairs for rows carrying metadata.
    pub entries: ConfigSet,

    /// True when the load ran before the HSM was ready and protected
    /// values could not be produced; the result is provisional.
    pub delay: bool,
}

/// Persistent key-value backend for configuration rows.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch every persisted row.
    async fn fetch_all(&self) -> ConfigResult<StoreLoad>;

    /// Write one entry (insert or overwrite).
    async fn write(&self, entry: &ConfigEntry) -> ConfigResult<()>;

    /// Delete one key; deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> ConfigResult<()>;
}
