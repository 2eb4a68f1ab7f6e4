//! Process-wide snapshot holder and reload protocol.
//!
//! # Data Flow
//! ```text
//! store.fetch_all()  → (ConfigSet, delay)
//!     → tree::parse  → ConfigTree
//!     → Snapshot     (immutable)
//!     → atomic swap of Arc<Snapshot>
//!     → request views observe the new snapshot
//! ```
//!
//! # Design Decisions
//! - Replacement is total, never incremental, so a single pointer swap
//!   is the only synchronization readers need
//! - A failed reload keeps the previous snapshot in place (fail-safe)
//! - A `delay` snapshot is reloaded on the first access after the HSM
//!   reports ready; until then it is served as-is, degraded but available

use arc_swap::ArcSwapOption;
use std::sync::Arc;

use crate::error::ConfigResult;
use crate::hsm::HsmProbe;
use crate::snapshot::Snapshot;
use crate::store::ConfigStore;
use crate::tree;

/// Shared handle to the current configuration snapshot.
///
/// Owned by application lifecycle and injected into request handlers;
/// one instance per process is expected but not enforced.
pub struct SharedConfig {
    store: Arc<dyn ConfigStore>,
    hsm: Arc<dyn HsmProbe>,
    here: String,
    current: ArcSwapOption<Snapshot>,
}

impl SharedConfig {
    /// Create a handle with no snapshot loaded yet; the first access
    /// pays the load cost.
    ///
    /// `here` is the application base installation path substituted for
    /// the `%(here)s` token in values.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        hsm: Arc<dyn HsmProbe>,
        here: impl Into<String>,
    ) -> Self {
        Self {
            store,
            hsm,
            here: here.into(),
            current: ArcSwapOption::const_empty(),
        }
    }

    /// The base installation path for `%(here)s` expansion.
    pub fn here(&self) -> &str {
        &self.here
    }

    /// The backing store behind this handle.
    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// The currently published snapshot, if any. Does not load.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Probe the HSM. Callers guard this with the delay flag of the
    /// snapshot they hold.
    pub(crate) fn hsm_ready(&self) -> bool {
        self.hsm.is_ready()
    }

    /// Fetch all rows, rebuild the tree and publish a new snapshot.
    ///
    /// On store failure the previous snapshot stays published and the
    /// error is returned.
    pub async fn reload(&self) -> ConfigResult<Arc<Snapshot>> {
        let load = self.store.fetch_all().await.map_err(|err| {
            tracing::error!(error = %err, "config reload failed, keeping current snapshot");
            err
        })?;

        let parsed = tree::parse(&load.entries, &self.here);
        let snapshot = Arc::new(Snapshot {
            entries: load.entries,
            tree: parsed,
            delay: load.delay,
        });

        self.current.store(Some(snapshot.clone()));
        tracing::info!(
            entries = snapshot.entries.len(),
            delay = snapshot.delay,
            "configuration snapshot published"
        );
        Ok(snapshot)
    }

    /// The current snapshot, loading lazily on first access.
    ///
    /// Delay gating: a snapshot loaded before the HSM was ready is
    /// replaced by a forced reload once the HSM reports ready. If that
    /// reload fails, the stale delay snapshot is served instead.
    pub async fn snapshot(&self) -> ConfigResult<Arc<Snapshot>> {
        match self.current.load_full() {
            None => self.reload().await,
            Some(current) if current.delay && self.hsm.is_ready() => {
                match self.reload().await {
                    Ok(fresh) => Ok(fresh),
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            "reload after HSM readiness failed, serving stale snapshot"
                        );
                        Ok(current)
                    }
                }
            }
            Some(current) => Ok(current),
        }
    }
}
