//! Hardware security module readiness probe.
//!
//! A snapshot loaded while the HSM was still starting up carries
//! `delay = true` and is provisional. The probe is consulted on every
//! access to such a snapshot; once it reports ready, the snapshot is
//! reloaded instead of reused.

use std::sync::atomic::{AtomicBool, Ordering};

/// Readiness probe for the security module gating full config loads.
pub trait HsmProbe: Send + Sync {
    /// Whether the module can decrypt protected values.
    fn is_ready(&self) -> bool;
}

/// Process-local readiness flag.
///
/// Applications flip it once HSM initialization completes; tests use it
/// to drive the delay/reload scenario.
#[derive(Debug, Default)]
pub struct HsmState {
    ready: AtomicBool,
}

impl HsmState {
    /// Create a probe in the not-ready state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a probe that already reports ready.
    pub fn ready() -> Self {
        let state = Self::new();
        state.set_ready(true);
        state
    }

    /// Flip the readiness flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

impl HsmProbe for HsmState {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
