//! Install and activation.
//!
//! Install pre-warms the `static` namespace; activation deletes every namespace left
//! over from other versions and then starts controlling traffic. Until activation the
//! gateway forwards requests without caching.
//!
//! A restart re-runs install. When the current version's namespaces already hold
//! entries from an earlier run, a failed core precache keeps that cache instead of
//! retiring the gateway.

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tracing::{info, warn};

use super::context::GatewayContext;
use super::error::GatewayError;
use super::fetch::fetch_success;
use super::maintenance;
use super::request::GatewayRequest;
use crate::cache::{NamespaceState, StorageError, SweepReport, parse_namespace_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        }
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to open namespace `{namespace}`: {source}")]
    Storage {
        namespace: String,
        #[source]
        source: StorageError,
    },
    #[error("invalid precache entry `{entry}`: {source}")]
    InvalidEntry {
        entry: String,
        #[source]
        source: url::ParseError,
    },
    #[error("core asset `{url}` could not be cached: {source}")]
    CoreAsset {
        url: String,
        #[source]
        source: GatewayError,
    },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error("activation failed: {0}")]
    Activate(#[from] StorageError),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub warmed: Vec<String>,
    pub skipped: Vec<String>,
    /// Install fell back to namespaces persisted by an earlier run.
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceTransition {
    pub name: String,
    pub state: NamespaceState,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    pub rollover: Vec<NamespaceTransition>,
    pub sweep: SweepReport,
}

/// Lifecycle state plus the skip-waiting signal.
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    skip_waiting: Notify,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Parsed);
        Self {
            state,
            skip_waiting: Notify::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == LifecycleState::Active
    }

    pub(crate) fn set(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(
                from = previous.as_str(),
                to = next.as_str(),
                "lifecycle transition"
            );
        }
    }

    /// Release an installed gateway that is waiting to activate. A signal sent
    /// before anyone waits is kept for the next waiter.
    pub fn skip_waiting(&self) {
        self.skip_waiting.notify_one();
    }

    pub(crate) async fn skip_waiting_signalled(&self) {
        self.skip_waiting.notified().await;
    }

    /// Resolves once the gateway is active.
    pub async fn wait_until_active(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == LifecycleState::Active).await;
    }
}

pub(crate) async fn install(
    ctx: &GatewayContext,
    lifecycle: &Lifecycle,
) -> Result<InstallReport, InstallError> {
    lifecycle.set(LifecycleState::Installing);
    let persisted = has_persisted_entries(ctx).await;

    match warm(ctx).await {
        Ok(report) => {
            info!(
                version = %ctx.config.version,
                warmed = report.warmed.len(),
                skipped = report.skipped.len(),
                "install complete"
            );
            lifecycle.set(LifecycleState::Installed);
            Ok(report)
        }
        Err(InstallError::CoreAsset { url, source }) if persisted => {
            warn!(
                version = %ctx.config.version,
                url = %url,
                error = %source,
                "core precache failed, keeping the persisted cache"
            );
            lifecycle.set(LifecycleState::Installed);
            Ok(InstallReport {
                warmed: Vec::new(),
                skipped: vec![url],
                reused: true,
            })
        }
        Err(err) => {
            lifecycle.set(LifecycleState::Redundant);
            Err(err)
        }
    }
}

/// Whether any current-version namespace already holds entries.
async fn has_persisted_entries(ctx: &GatewayContext) -> bool {
    let existing = match ctx.storage.namespaces().await {
        Ok(names) => names,
        Err(err) => {
            warn!(error = %err, "failed to list namespaces before install");
            return false;
        }
    };

    for namespace in ctx.namespaces.iter() {
        if !existing.contains(&namespace.name) {
            continue;
        }
        if ctx
            .storage
            .keys(&namespace.name)
            .await
            .is_ok_and(|keys| !keys.is_empty())
        {
            return true;
        }
    }
    false
}

async fn warm(ctx: &GatewayContext) -> Result<InstallReport, InstallError> {
    for namespace in ctx.namespaces.iter() {
        ctx.storage
            .open(&namespace.name)
            .await
            .map_err(|source| InstallError::Storage {
                namespace: namespace.name.clone(),
                source,
            })?;
    }

    let static_ns = &ctx.namespaces.static_assets;
    let mut report = InstallReport::default();

    for entry in &ctx.config.precache_core {
        let url = ctx
            .config
            .resolve(entry)
            .map_err(|source| InstallError::InvalidEntry {
                entry: entry.clone(),
                source,
            })?;
        let request = GatewayRequest::get(url);
        let key = ctx.key_for(&request.url);
        let core_failure = |source| InstallError::CoreAsset {
            url: request.url.to_string(),
            source,
        };

        let response = fetch_success(ctx.fetcher.as_ref(), &request, ctx.config.static_timeout)
            .await
            .map_err(core_failure)?;
        ctx.store(static_ns, &key, &response)
            .await
            .map_err(core_failure)?;
        report.warmed.push(key.to_string());
    }

    let optional = ctx.config.precache_optional.iter().map(|entry| async move {
        let url = match ctx.config.resolve(entry) {
            Ok(url) => url,
            Err(err) => {
                warn!(entry = %entry, error = %err, "skipping invalid optional precache entry");
                return Err(entry.clone());
            }
        };
        let request = GatewayRequest::get(url);
        let key = ctx.key_for(&request.url);
        let result = match fetch_success(ctx.fetcher.as_ref(), &request, ctx.config.static_timeout)
            .await
        {
            Ok(response) => ctx.store(static_ns, &key, &response).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => Ok(key.to_string()),
            Err(err) => {
                warn!(url = %request.url, error = %err, "optional precache failed");
                Err(key.to_string())
            }
        }
    });

    for outcome in join_all(optional).await {
        match outcome {
            Ok(warmed) => report.warmed.push(warmed),
            Err(skipped) => report.skipped.push(skipped),
        }
    }

    Ok(report)
}

pub(crate) async fn activate(
    ctx: &GatewayContext,
    lifecycle: &Lifecycle,
) -> Result<ActivationReport, StorageError> {
    lifecycle.set(LifecycleState::Activating);

    match rollover(ctx).await {
        Ok(rollover) => {
            let sweep = maintenance::sweep(ctx).await;
            lifecycle.set(LifecycleState::Active);
            Ok(ActivationReport { rollover, sweep })
        }
        Err(err) => {
            lifecycle.set(LifecycleState::Installed);
            Err(err)
        }
    }
}

/// Delete every namespace of ours that is not at the current version.
async fn rollover(ctx: &GatewayContext) -> Result<Vec<NamespaceTransition>, StorageError> {
    for namespace in ctx.namespaces.iter() {
        ctx.storage.open(&namespace.name).await?;
    }

    let prefix = &ctx.config.cache_prefix;
    let mut transitions = Vec::new();

    for name in ctx.storage.namespaces().await? {
        if parse_namespace_name(&name, prefix).is_none() || ctx.namespaces.contains_name(&name) {
            continue;
        }

        info!(
            namespace = %name,
            state = NamespaceState::Superseded.as_str(),
            "namespace superseded"
        );
        ctx.storage.delete_namespace(&name).await?;
        info!(
            namespace = %name,
            state = NamespaceState::Deleted.as_str(),
            "namespace deleted"
        );
        transitions.push(NamespaceTransition {
            name,
            state: NamespaceState::Deleted,
        });
    }

    Ok(transitions)
}
