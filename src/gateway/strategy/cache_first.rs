//! Cache-first handling for static assets.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cache::metadata::entry_age;
use crate::cache::{RequestKey, StoredResponse};
use crate::gateway::classify::is_revalidate_eligible;
use crate::gateway::context::{GatewayContext, Served};
use crate::gateway::fallback;
use crate::gateway::fetch::fetch_success;
use crate::gateway::request::GatewayRequest;

/// Serve from the `static` namespace when present; go to the network only on a miss.
#[instrument(skip_all, fields(url = %request.url, class = "static"))]
pub async fn handle(ctx: &Arc<GatewayContext>, request: GatewayRequest, key: RequestKey) -> Served {
    let namespace = &ctx.namespaces.static_assets;

    if let Ok(cached) = ctx.lookup(namespace, &key).await {
        debug!(outcome = "hit", "serving cached asset");
        if is_revalidate_eligible(&ctx.config, &request.url) && due_for_revalidation(ctx, &cached) {
            spawn_revalidation(Arc::clone(ctx), request, key);
        }
        return Served::cache(cached);
    }

    match fetch_success(ctx.fetcher.as_ref(), &request, ctx.config.static_timeout).await {
        Ok(response) => {
            let _ = ctx.store(namespace, &key, &response).await;
            Served::network(response)
        }
        Err(err) => {
            ctx.note_network_failure(&err);
            ctx.stats.record_offline_fallback("static");
            warn!(error = %err, kind = err.kind(), "static asset unavailable, serving placeholder");
            Served::fallback(fallback::static_asset(&request.url))
        }
    }
}

/// Entries younger than `revalidate_after` are served without a background refetch.
fn due_for_revalidation(ctx: &GatewayContext, cached: &StoredResponse) -> bool {
    match entry_age(ctx.metadata.as_ref(), cached, ctx.now()) {
        Some(age) => age >= ctx.config.revalidate_after,
        None => true,
    }
}

/// Refetch an asset after it was served from cache. Errors stay in this task.
fn spawn_revalidation(ctx: Arc<GatewayContext>, request: GatewayRequest, key: RequestKey) {
    tokio::spawn(async move {
        let namespace = &ctx.namespaces.static_assets;
        match fetch_success(ctx.fetcher.as_ref(), &request, ctx.config.static_timeout).await {
            Ok(response) => {
                if ctx.store(namespace, &key, &response).await.is_ok() {
                    ctx.stats.record_revalidation();
                    debug!(key = %key, "revalidated static asset");
                }
            }
            Err(err) => {
                ctx.note_network_failure(&err);
                debug!(key = %key, error = %err, "background revalidation failed");
            }
        }
    });
}
