//! Server-side configuration cache.
//!
//! # Data Flow
//! ```text
//! backing store (ConfigStore)
//!     → SharedConfig::reload (fetch_all → tree::parse → Snapshot)
//!     → atomic swap of Arc<Snapshot>, readers never see a partial load
//!     → RequestContext / RequestView (copy-on-write overlay per request)
//!     → api::{get_from_config, store_config, update_config, ...}
//! ```
//!
//! Mutations write through to the store, so any later reload from any
//! request observes the same state. A snapshot loaded before the HSM
//! was ready is provisional (delay flag) and is reloaded on the first
//! access after the HSM reports ready.

pub mod api;
pub mod error;
pub mod hsm;
pub mod request;
pub mod snapshot;
pub mod store;
pub mod tree;

pub use error::{ConfigError, ConfigResult};
pub use hsm::{HsmProbe, HsmState};
pub use request::{RequestContext, RequestView};
pub use snapshot::{ConfigEntry, ConfigSet, EntryType, SharedConfig, Snapshot};
pub use store::{ConfigStore, MemoryStore, StoreLoad};
pub use tree::{ConfigTree, TreeEntry};
