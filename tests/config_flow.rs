//! End-to-end cache consistency scenarios.

use std::collections::BTreeMap;
use std::sync::Arc;

use config_cache::api;
use config_cache::{ConfigEntry, ConfigStore, EntryType, HsmState, MemoryStore, RequestContext, SharedConfig};

mod common;

#[tokio::test]
async fn test_delay_snapshot_serves_default_until_hsm_ready() {
    common::init_tracing();
    let hsm = Arc::new(HsmState::new());
    let store = MemoryStore::new(None).with_hsm(hsm.clone());
    store
        .write(&ConfigEntry {
            key: "EncSecretKey".into(),
            value: "topsecret".into(),
            entry_type: EntryType::Password,
            description: None,
        })
        .await
        .unwrap();

    let shared = Arc::new(SharedConfig::new(Arc::new(store), hsm.clone(), "/opt/app"));

    // First load runs before the HSM is ready: the protected row is
    // missing from the snapshot, so the caller sees its default.
    let mut ctx = RequestContext::new(shared.clone());
    let value = api::get_from_config(&mut ctx, "EncSecretKey", Some("default")).await;
    assert_eq!(value.as_deref(), Some("default"));
    assert!(shared.current().unwrap().delay);

    // HSM comes up: the next access forces a reload and the real value
    // appears, without any explicit refresh call.
    hsm.set_ready(true);
    let mut ctx = RequestContext::new(shared.clone());
    let value = api::get_from_config(&mut ctx, "EncSecretKey", Some("default")).await;
    assert_eq!(value.as_deref(), Some("topsecret"));
    assert!(!shared.current().unwrap().delay);
}

#[tokio::test]
async fn test_readiness_flip_applies_to_dirty_view_mid_request() {
    common::init_tracing();
    let hsm = Arc::new(HsmState::new());
    let store = MemoryStore::new(None).with_hsm(hsm.clone());
    store
        .write(&ConfigEntry {
            key: "ApiKey".into(),
            value: "secret123".into(),
            entry_type: EntryType::Password,
            description: None,
        })
        .await
        .unwrap();

    let shared = Arc::new(SharedConfig::new(Arc::new(store), hsm.clone(), "/opt/app"));

    // A mutation during the delay window dirties this request's view.
    let mut ctx = RequestContext::new(shared.clone());
    api::store_config(&mut ctx, "Issuer", "corp", None, None)
        .await
        .unwrap();
    assert!(api::get_from_config(&mut ctx, "ApiKey", None).await.is_none());

    // Same context, same dirty view: readiness still forces a reload.
    hsm.set_ready(true);
    let value = api::get_from_config(&mut ctx, "ApiKey", None).await;
    assert_eq!(value.as_deref(), Some("secret123"));
    // The request-local edit survived via write-through.
    let value = api::get_from_config(&mut ctx, "Issuer", None).await;
    assert_eq!(value.as_deref(), Some("corp"));
    assert!(!shared.current().unwrap().delay);
}

#[tokio::test]
async fn test_missing_key_serves_default_during_delay() {
    common::init_tracing();
    let hsm = Arc::new(HsmState::new());
    let store = MemoryStore::new(None).with_hsm(hsm.clone());
    let shared = Arc::new(SharedConfig::new(Arc::new(store), hsm.clone(), "/opt/app"));

    let mut ctx = RequestContext::new(shared.clone());
    let value = api::get_from_config(&mut ctx, "x", Some("fallback")).await;
    assert_eq!(value.as_deref(), Some("fallback"));
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    common::init_tracing();
    let store = common::seeded_store(&[("Realm", "corp"), ("DefaultOtpLen", "6")]).await;
    let shared = common::shared_over(store);

    let mut ctx = RequestContext::new(shared.clone());
    api::refresh_config(&mut ctx).await.unwrap();
    let first = shared.current().unwrap();

    api::refresh_config(&mut ctx).await.unwrap();
    let second = shared.current().unwrap();

    // New snapshot object, identical contents.
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.entries, second.entries);
    assert_eq!(first.tree, second.tree);
}

#[tokio::test]
async fn test_overlay_is_isolated_between_requests() {
    common::init_tracing();
    let store = common::seeded_store(&[("Policy", "old")]).await;
    let shared = common::shared_over(store);

    let mut writer = RequestContext::new(shared.clone());
    let mut reader = RequestContext::new(shared.clone());

    // Publish the initial snapshot before any mutation runs.
    let seen = api::get_from_config(&mut reader, "Policy", None).await;
    assert_eq!(seen.as_deref(), Some("old"));

    api::store_config(&mut writer, "Policy", "new", None, None)
        .await
        .unwrap();

    // The writer sees its overlay immediately.
    let seen = api::get_from_config(&mut writer, "Policy", None).await;
    assert_eq!(seen.as_deref(), Some("new"));

    // The reader still sees the published snapshot until a reload runs;
    // no half-written state leaks across requests.
    let seen = api::get_from_config(&mut reader, "Policy", None).await;
    assert_eq!(seen.as_deref(), Some("old"));

    // Write-through: a reload from any request surfaces the new value.
    api::refresh_config(&mut reader).await.unwrap();
    let seen = api::get_from_config(&mut reader, "Policy", None).await;
    assert_eq!(seen.as_deref(), Some("new"));
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    common::init_tracing();
    let inner = common::seeded_store(&[("Realm", "corp")]).await;
    let flaky = Arc::new(common::FlakyStore::new(inner));
    let shared = Arc::new(SharedConfig::new(
        flaky.clone(),
        Arc::new(HsmState::ready()),
        "/opt/app",
    ));

    let before = shared.snapshot().await.unwrap();

    flaky.set_failing(true);
    assert!(shared.reload().await.is_err());

    // Readers keep getting the last good snapshot.
    let after = shared.snapshot().await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.get("Realm"), Some("corp"));

    flaky.set_failing(false);
    let recovered = shared.reload().await.unwrap();
    assert_eq!(recovered.get("Realm"), Some("corp"));
}

#[tokio::test]
async fn test_first_load_failure_reads_as_default() {
    common::init_tracing();
    let flaky = Arc::new(common::FlakyStore::new(MemoryStore::new(None)));
    flaky.set_failing(true);
    let shared = Arc::new(SharedConfig::new(
        flaky.clone(),
        Arc::new(HsmState::ready()),
        "/opt/app",
    ));

    // No snapshot can be built, but get still never fails.
    let mut ctx = RequestContext::new(shared.clone());
    let value = api::get_from_config(&mut ctx, "Realm", Some("fallback")).await;
    assert_eq!(value.as_deref(), Some("fallback"));
}

#[tokio::test]
async fn test_typed_update_then_reload_round_trip() {
    common::init_tracing();
    let store = MemoryStore::new(None);
    let shared = common::shared_over(store);

    let mut ctx = RequestContext::new(shared.clone());
    let mut batch = BTreeMap::new();
    batch.insert("SmtpPassword".to_string(), "hunter2".to_string());
    batch.insert("SmtpPassword.type".to_string(), "password".to_string());
    batch.insert("SmtpPassword.desc".to_string(), "mail relay".to_string());
    batch.insert("SmtpUrl".to_string(), "%(here)s/mail.sock".to_string());
    api::update_config(&mut ctx, &batch).await.unwrap();

    // A fresh request after reload sees the typed entry via the tree.
    let mut ctx = RequestContext::new(shared.clone());
    api::refresh_config(&mut ctx).await.unwrap();

    let snapshot = shared.current().unwrap();
    let entry = snapshot.tree.get("SmtpPassword").unwrap();
    assert_eq!(entry.entry_type, EntryType::Password);
    assert_eq!(entry.description.as_deref(), Some("mail relay"));

    let url = snapshot.get("SmtpUrl").unwrap();
    assert_eq!(url, "/opt/app/mail.sock");
}

#[tokio::test]
async fn test_remove_via_api_deletes_all_case_matches() {
    common::init_tracing();
    let store = common::seeded_store(&[("foo", "1"), ("linotp.foo", "2"), ("food", "3")]).await;
    let shared = common::shared_over(store.clone());

    let mut ctx = RequestContext::new(shared);
    let removed = api::remove_from_config(&mut ctx, "Foo", true).await.unwrap();
    assert_eq!(removed, 2);

    let load = store.fetch_all().await.unwrap();
    assert!(!load.entries.contains_key("foo"));
    assert!(!load.entries.contains_key("linotp.foo"));
    assert!(load.entries.contains_key("food"));
}
