//! The response-caching gateway.
//!
//! [`Gateway`] sits between the page and the network. Once active it classifies each
//! intercepted GET and answers it with the strategy for its class; before that it
//! forwards everything unchanged.

pub mod classify;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod maintenance;
pub mod messages;
pub mod request;
pub mod stats;
pub mod strategy;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{Partition, StorageError, SweepReport, has_refresh_param};

pub use classify::RequestClass;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Branding, GatewayConfig};
pub use context::{GatewayContext, Namespaces, ResponseSource, SOURCE_HEADER, Served};
pub use error::GatewayError;
pub use fallback::FALLBACK_HEADER;
pub use fetch::{FetchError, Fetcher};
pub use lifecycle::{
    ActivationReport, InstallError, InstallReport, Lifecycle, LifecycleError, LifecycleState,
    NamespaceTransition,
};
pub use messages::{
    ClearReport, ClientMessage, GatewayReply, MessageSender, NamespaceStatus, StatusSnapshot,
};
pub use request::GatewayRequest;
pub use stats::{GatewayStats, StatsSnapshot};

pub struct Gateway {
    ctx: Arc<GatewayContext>,
    lifecycle: Lifecycle,
}

impl Gateway {
    pub fn new(ctx: GatewayContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn should_intercept(&self, request: &GatewayRequest) -> bool {
        classify::should_intercept(&self.ctx.config, request)
    }

    /// Answer an intercepted request. Never fails: every path ends in a network
    /// response, a cached copy or a synthesized fallback.
    pub async fn handle(&self, request: GatewayRequest) -> Served {
        if !self.lifecycle.is_active() || !self.should_intercept(&request) {
            return self.pass_through(request).await;
        }

        let class = classify::classify(&self.ctx.config, &request);
        let key = self.ctx.key_for(&request.url);
        debug!(class = class.as_str(), key = %key, "intercepted request");

        match class {
            RequestClass::Static => strategy::cache_first::handle(&self.ctx, request, key).await,
            RequestClass::DataApi => {
                let refresh = request.wants_fresh()
                    || has_refresh_param(&request.url, &self.ctx.config.refresh_params);
                strategy::network_first::handle(&self.ctx, request, key, refresh).await
            }
            RequestClass::Navigation => {
                strategy::navigation::handle(&self.ctx, request, key).await
            }
            RequestClass::Other => self.pass_through(request).await,
        }
    }

    /// Forward without touching the cache. Any upstream status is returned as is; an
    /// unreachable upstream becomes a bare 502.
    pub async fn pass_through(&self, request: GatewayRequest) -> Served {
        match fetch::forward(
            self.ctx.fetcher.as_ref(),
            &request,
            self.ctx.config.passthrough_timeout,
        )
        .await
        {
            Ok(response) => Served::pass_through(response),
            Err(err) => {
                self.ctx.note_network_failure(&err);
                warn!(url = %request.url, error = %err, "upstream unreachable");
                Served::pass_through(fallback::bad_gateway())
            }
        }
    }

    pub async fn install(&self) -> Result<InstallReport, InstallError> {
        lifecycle::install(&self.ctx, &self.lifecycle).await
    }

    pub async fn activate(&self) -> Result<ActivationReport, StorageError> {
        lifecycle::activate(&self.ctx, &self.lifecycle).await
    }

    /// Install, optionally wait for `SKIP_WAITING`, then activate.
    pub async fn run_lifecycle(&self, skip_waiting: bool) -> Result<ActivationReport, LifecycleError> {
        self.install().await?;
        if !skip_waiting {
            info!("installed; waiting for SKIP_WAITING before activation");
            self.lifecycle.skip_waiting_signalled().await;
        }
        let report = self.activate().await?;
        info!(
            version = %self.ctx.config.version,
            deleted = report.rollover.len(),
            trimmed = report.sweep.trimmed,
            purged = report.sweep.purged,
            "gateway active"
        );
        Ok(report)
    }

    pub async fn sweep(&self) -> SweepReport {
        maintenance::sweep(&self.ctx).await
    }

    /// Empty one partition, or every current namespace when `partition` is `None`.
    pub async fn clear(&self, partition: Option<Partition>) -> Result<ClearReport, StorageError> {
        let mut report = ClearReport::default();
        for namespace in self.ctx.namespaces.iter() {
            if partition.is_some_and(|wanted| wanted != namespace.partition) {
                continue;
            }
            let entries = self.ctx.storage.keys(&namespace.name).await?.len();
            self.ctx.storage.delete_namespace(&namespace.name).await?;
            self.ctx.storage.open(&namespace.name).await?;
            report.entries += entries;
            report.namespaces.push(namespace.name.clone());
        }
        info!(
            namespaces = report.namespaces.len(),
            entries = report.entries,
            "cleared cache"
        );
        Ok(report)
    }

    pub async fn status(&self) -> StatusSnapshot {
        let mut namespaces = Vec::new();
        for namespace in self.ctx.namespaces.iter() {
            let entries = match self.ctx.storage.keys(&namespace.name).await {
                Ok(keys) => keys.len(),
                Err(err) => {
                    warn!(namespace = %namespace.name, error = %err, "failed to count entries");
                    0
                }
            };
            namespaces.push(NamespaceStatus {
                name: namespace.name.clone(),
                partition: namespace.partition,
                entries,
                max_entries: namespace.max_entries.get(),
                max_age_seconds: namespace.max_age.as_secs(),
                policy: namespace.policy,
            });
        }

        StatusSnapshot {
            version: self.ctx.config.version.clone(),
            state: self.lifecycle.state(),
            stats: self.ctx.stats.snapshot(),
            namespaces,
        }
    }

    pub async fn dispatch(&self, message: ClientMessage) -> GatewayReply {
        match message {
            ClientMessage::SkipWaiting => {
                self.lifecycle.skip_waiting();
                GatewayReply::Ack {
                    action: "skip_waiting",
                }
            }
            ClientMessage::GetStatus => GatewayReply::Status(self.status().await),
            ClientMessage::ClearCache { namespace } => {
                let partition = match namespace.as_deref().map(str::parse::<Partition>) {
                    None => None,
                    Some(Ok(partition)) => Some(partition),
                    Some(Err(message)) => return GatewayReply::Error { message },
                };
                match self.clear(partition).await {
                    Ok(report) => GatewayReply::Cleared(report),
                    Err(err) => GatewayReply::Error {
                        message: err.to_string(),
                    },
                }
            }
            ClientMessage::RunMaintenance => GatewayReply::Maintenance(self.sweep().await),
        }
    }
}
