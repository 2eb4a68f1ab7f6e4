//! Public configuration operations.
//!
//! Thin dispatch over the request context: each operation resolves the
//! request's view (fabricating it if absent) and forwards. No business
//! logic beyond argument shaping lives here.

use std::collections::BTreeMap;

use crate::error::ConfigResult;
use crate::request::RequestContext;
use crate::snapshot::EntryType;

/// Read a config value, falling back to `default` on a miss.
///
/// Never fails; store problems are logged inside the view and read as
/// a miss.
pub async fn get_from_config(
    ctx: &mut RequestContext,
    key: &str,
    default: Option<&str>,
) -> Option<String> {
    match ctx.view().get(key).await {
        Some(value) => Some(value),
        None => default.map(str::to_string),
    }
}

/// Write one config entry through to the store.
pub async fn store_config(
    ctx: &mut RequestContext,
    key: &str,
    value: &str,
    entry_type: Option<EntryType>,
    description: Option<&str>,
) -> ConfigResult<()> {
    ctx.view().store(key, value, entry_type, description).await
}

/// Bulk write with `.type`/`.desc` sidecar handling.
pub async fn update_config(
    ctx: &mut RequestContext,
    batch: &BTreeMap<String, String>,
) -> ConfigResult<()> {
    ctx.view().update(batch).await
}

/// Delete matching entries, returning how many were removed.
pub async fn remove_from_config(
    ctx: &mut RequestContext,
    key: &str,
    case_insensitive: bool,
) -> ConfigResult<usize> {
    tracing::debug!(key, "removing config entry");
    ctx.view().remove(key, case_insensitive).await
}

/// Discard the request-local overlay and force a process-wide reload.
pub async fn refresh_config(ctx: &mut RequestContext) -> ConfigResult<()> {
    ctx.view().refresh(true).await
}

// Convenience setters for well-known keys.

pub async fn set_default_max_fail_count(
    ctx: &mut RequestContext,
    max_fail_count: u32,
) -> ConfigResult<()> {
    store_config(ctx, "DefaultMaxFailCount", &max_fail_count.to_string(), None, None).await
}

pub async fn set_default_sync_window(
    ctx: &mut RequestContext,
    sync_window: u32,
) -> ConfigResult<()> {
    store_config(ctx, "DefaultSyncWindow", &sync_window.to_string(), None, None).await
}

pub async fn set_default_count_window(
    ctx: &mut RequestContext,
    count_window: u32,
) -> ConfigResult<()> {
    store_config(ctx, "DefaultCountWindow", &count_window.to_string(), None, None).await
}

pub async fn set_default_otp_len(ctx: &mut RequestContext, otp_len: u32) -> ConfigResult<()> {
    store_config(ctx, "DefaultOtpLen", &otp_len.to_string(), None, None).await
}

pub async fn set_default_reset_fail_count(
    ctx: &mut RequestContext,
    reset_fail_count: bool,
) -> ConfigResult<()> {
    store_config(
        ctx,
        "DefaultResetFailCount",
        &reset_fail_count.to_string(),
        None,
        None,
    )
    .await
}
