//! Shared utilities for integration tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use config_cache::{
    ConfigEntry, ConfigError, ConfigResult, ConfigStore, EntryType, HsmState, MemoryStore,
    SharedConfig, StoreLoad,
};

static TRACING: Once = Once::new();

/// Initialize the tracing subscriber once per test binary, so reload
/// and mutation logs show up under `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "config_cache=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A store whose fetch path can be switched to fail on demand.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for FlakyStore {
    async fn fetch_all(&self) -> ConfigResult<StoreLoad> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ConfigError::StoreUnavailable(
                "injected fetch failure".into(),
            ));
        }
        self.inner.fetch_all().await
    }

    async fn write(&self, entry: &ConfigEntry) -> ConfigResult<()> {
        self.inner.write(entry).await
    }

    async fn delete(&self, key: &str) -> ConfigResult<()> {
        self.inner.delete(key).await
    }
}

/// Seed a MemoryStore with plain string rows.
#[allow(dead_code)]
pub async fn seeded_store(rows: &[(&str, &str)]) -> MemoryStore {
    let store = MemoryStore::new(None);
    for (key, value) in rows {
        store
            .write(&ConfigEntry {
                key: (*key).into(),
                value: (*value).into(),
                entry_type: EntryType::String,
                description: None,
            })
            .await
            .unwrap();
    }
    store
}

/// Shared handle over the given store with an already-ready HSM.
#[allow(dead_code)]
pub fn shared_over(store: impl ConfigStore + 'static) -> Arc<SharedConfig> {
    Arc::new(SharedConfig::new(
        Arc::new(store),
        Arc::new(HsmState::ready()),
        "/opt/app",
    ))
}
