//! Periodic sweep: entry bounds on every namespace, plus an age purge on `news-data`.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Gateway;
use super::context::GatewayContext;
use crate::cache::{Partition, SweepReport, eviction};

/// Run one sweep over the current namespaces. Idempotent: a second run with no
/// traffic in between removes nothing.
pub async fn sweep(ctx: &GatewayContext) -> SweepReport {
    let now = ctx.now();
    let mut report = SweepReport::default();

    for namespace in ctx.namespaces.iter() {
        let mut partial = SweepReport::default();

        if namespace.partition == Partition::NewsData {
            match eviction::purge_expired(
                ctx.storage.as_ref(),
                ctx.metadata.as_ref(),
                namespace,
                now,
            )
            .await
            {
                Ok(purged) => partial.purged = purged,
                Err(err) => warn!(namespace = %namespace.name, error = %err, "age purge failed"),
            }
        }

        match eviction::trim(ctx.storage.as_ref(), namespace).await {
            Ok(trimmed) => partial.trimmed = trimmed,
            Err(err) => warn!(namespace = %namespace.name, error = %err, "trim failed"),
        }

        ctx.stats.record_evictions(namespace.partition, partial.total());
        report.merge(partial);
    }

    if report.total() > 0 {
        info!(
            trimmed = report.trimmed,
            purged = report.purged,
            "maintenance sweep removed entries"
        );
    } else {
        debug!("maintenance sweep found nothing to remove");
    }
    report
}

/// Sweep on a fixed interval once the gateway is active.
pub fn spawn_maintenance(gateway: Arc<Gateway>) -> JoinHandle<()> {
    let period = gateway.context().config.maintenance_interval;
    tokio::spawn(async move {
        gateway.lifecycle().wait_until_active().await;
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            gateway.sweep().await;
        }
    })
}
