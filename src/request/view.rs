//! Per-request configuration view.
//!
//! A view starts as a forwarding wrapper over the process-wide
//! snapshot. The first mutation copies the snapshot's flat map into a
//! request-local overlay; from then on all reads in this request come
//! from the overlay, so concurrent requests never observe another
//! request's in-flight edits. Every mutation writes through to the
//! backing store before touching the overlay.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ConfigResult;
use crate::snapshot::{mask_value, ConfigEntry, ConfigSet, EntryType, NAMESPACE_PREFIX};
use crate::snapshot::shared::SharedConfig;
use crate::tree::{expand_here, DESC_SUFFIX, TYPE_SUFFIX};

/// Copy-on-write view of the configuration, lifetime of one request.
pub struct RequestView {
    shared: Arc<SharedConfig>,
    overlay: Option<ConfigSet>,
    /// Delay flag of the snapshot the overlay was cloned from. While
    /// set, every access probes the HSM and re-materializes from a
    /// forced reload once it reports ready.
    overlay_delay: bool,
}

impl RequestView {
    pub(crate) fn new(shared: Arc<SharedConfig>) -> Self {
        Self {
            shared,
            overlay: None,
            overlay_delay: false,
        }
    }

    /// Whether this view owns request-local changes.
    pub fn is_dirty(&self) -> bool {
        self.overlay.is_some()
    }

    /// Read a value: the request-local overlay wins, otherwise the
    /// current process-wide snapshot. Never fails; an unavailable
    /// snapshot is logged and reads as a miss.
    pub async fn get(&mut self, key: &str) -> Option<String> {
        self.resync_if_ready().await;
        if let Some(overlay) = &self.overlay {
            return overlay.get(key).cloned();
        }
        match self.shared.snapshot().await {
            Ok(snapshot) => snapshot.entries.get(key).cloned(),
            Err(err) => {
                tracing::warn!(error = %err, key, "config read without a snapshot");
                None
            }
        }
    }

    /// Write one entry through to the store and into the overlay, so
    /// later reads in this request see it without a reload.
    pub async fn store(
        &mut self,
        key: &str,
        value: &str,
        entry_type: Option<EntryType>,
        description: Option<&str>,
    ) -> ConfigResult<()> {
        let entry = ConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
            entry_type: entry_type.unwrap_or_default(),
            description: description.map(str::to_string),
        };

        tracing::debug!(
            key,
            value = %mask_value(&entry.entry_type, &entry.value),
            "changing config entry"
        );

        self.shared.store().write(&entry).await?;

        self.ensure_overlay().await;
        if let Some(overlay) = &mut self.overlay {
            overlay.insert(entry.key.clone(), entry.value.clone());
            if entry.entry_type != EntryType::String {
                overlay.insert(
                    format!("{key}{TYPE_SUFFIX}"),
                    entry.entry_type.as_tag().to_string(),
                );
            }
            if let Some(description) = &entry.description {
                overlay.insert(format!("{key}{DESC_SUFFIX}"), description.clone());
            }
        }
        Ok(())
    }

    /// Bulk write with sidecar detection.
    ///
    /// If any base key in the batch carries a `.type`/`.desc` sidecar,
    /// the whole batch is written typed: sidecars attach to their base
    /// key and are never persisted as entries, and base keys without
    /// sidecars default to type `string`. A sidecar with no base key in
    /// the batch is written as an ordinary entry. Without any sidecars
    /// the batch is written as-is. `%(here)s` is expanded before
    /// persistence in both modes.
    pub async fn update(&mut self, batch: &BTreeMap<String, String>) -> ConfigResult<()> {
        let here = self.shared.here().to_string();

        let sidecar_of_present_base = |key: &str| {
            [TYPE_SUFFIX, DESC_SUFFIX].iter().any(|suffix| {
                key.strip_suffix(suffix)
                    .is_some_and(|base| batch.contains_key(base))
            })
        };
        let typing = batch.keys().any(|key| sidecar_of_present_base(key));

        if typing {
            for (key, value) in batch {
                if sidecar_of_present_base(key) {
                    continue;
                }
                let entry_type = batch
                    .get(&format!("{key}{TYPE_SUFFIX}"))
                    .map(|tag| EntryType::from_tag(tag));
                let description = batch.get(&format!("{key}{DESC_SUFFIX}"));
                let value = expand_here(value, &here);
                self.store(key, &value, entry_type, description.map(String::as_str))
                    .await?;
            }
        } else {
            for (key, value) in batch {
                let value = expand_here(value, &here);
                self.store(key, &value, None, None).await?;
            }
        }
        Ok(())
    }

    /// Delete entries matching `key`, returning how many were removed.
    ///
    /// Exact match by default. Case-insensitive matching also accepts
    /// keys whose lowercase form equals the lowercase target with the
    /// literal `linotp.` prefix stripped, and deletes every match.
    pub async fn remove(&mut self, key: &str, case_insensitive: bool) -> ConfigResult<usize> {
        self.resync_if_ready().await;
        let keys: Vec<String> = match &self.overlay {
            Some(overlay) => overlay.keys().cloned().collect(),
            None => match self.shared.snapshot().await {
                Ok(snapshot) => snapshot.entries.keys().cloned().collect(),
                Err(err) => {
                    tracing::warn!(error = %err, key, "config remove without a snapshot");
                    Vec::new()
                }
            },
        };

        let matches: Vec<String> = if case_insensitive {
            let target = key.to_lowercase();
            let namespaced = format!("{NAMESPACE_PREFIX}{target}");
            keys.into_iter()
                .filter(|candidate| {
                    let lowered = candidate.to_lowercase();
                    lowered == target || lowered == namespaced
                })
                .collect()
        } else {
            keys.into_iter().filter(|candidate| candidate == key).collect()
        };

        if matches.is_empty() {
            tracing::debug!(key, "no config entry matched for removal");
            return Ok(0);
        }

        let store = self.shared.store().clone();
        for matched in &matches {
            store.delete(matched).await?;
        }

        self.ensure_overlay().await;
        if let Some(overlay) = &mut self.overlay {
            for matched in &matches {
                overlay.remove(matched);
            }
        }

        tracing::debug!(key, removed = matches.len(), "removed config entries");
        Ok(matches.len())
    }

    /// Discard the request-local overlay; with `force_reload`, also run
    /// the process-wide reload protocol.
    pub async fn refresh(&mut self, force_reload: bool) -> ConfigResult<()> {
        self.overlay = None;
        self.overlay_delay = false;
        if force_reload {
            self.shared.reload().await?;
        }
        Ok(())
    }

    /// Copy the current snapshot's flat map into the overlay, once,
    /// remembering whether that snapshot was provisional.
    async fn ensure_overlay(&mut self) {
        if self.overlay.is_some() {
            return;
        }
        let (base, delay) = match self.shared.snapshot().await {
            Ok(snapshot) => (snapshot.entries.clone(), snapshot.delay),
            Err(err) => {
                tracing::warn!(error = %err, "overlay started from empty set, no snapshot");
                (ConfigSet::new(), true)
            }
        };
        self.overlay = Some(base);
        self.overlay_delay = delay;
    }

    /// A dirty view cloned from a delay snapshot stays provisional:
    /// once the HSM reports ready, re-materialize from a forced reload.
    /// Request-local edits were written through, so nothing is lost.
    async fn resync_if_ready(&mut self) {
        if self.overlay.is_none() || !self.overlay_delay || !self.shared.hsm_ready() {
            return;
        }
        match self.shared.reload().await {
            Ok(snapshot) => {
                self.overlay = Some(snapshot.entries.clone());
                self.overlay_delay = snapshot.delay;
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "reload after HSM readiness failed, keeping provisional overlay"
                );
            }
        }
    }
}
