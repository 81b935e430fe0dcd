use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cache::RequestKey;
use crate::gateway::context::{GatewayContext, Served};
use crate::gateway::fallback;
use crate::gateway::fetch::fetch_with_timeout;
use crate::gateway::request::GatewayRequest;

/// Document loads: network, then the cached document, then the cached root, then an
/// offline page built in memory. Only an unreachable network falls back; an upstream
/// error page is the answer and is returned as is, uncached.
#[instrument(skip_all, fields(url = %request.url, class = "navigation"))]
pub async fn handle(ctx: &Arc<GatewayContext>, request: GatewayRequest, key: RequestKey) -> Served {
    let namespace = &ctx.namespaces.pages;

    let err = match fetch_with_timeout(
        ctx.fetcher.as_ref(),
        &request,
        ctx.config.navigation_timeout,
    )
    .await
    {
        Ok(response) => {
            if response.is_success() {
                let _ = ctx.store(namespace, &key, &response).await;
            } else {
                debug!(status = response.status, "upstream error page, not caching");
            }
            return Served::network(response);
        }
        Err(err) => err,
    };

    ctx.note_network_failure(&err);

    if let Ok(cached) = ctx.lookup(namespace, &key).await {
        warn!(error = %err, "navigation failed, serving cached document");
        return Served::cache(cached);
    }

    // Install pre-warms the root document into the static namespace.
    if let Ok(root) = request.url.join("/") {
        let root_key = ctx.key_for(&root);
        for candidate in [namespace, &ctx.namespaces.static_assets] {
            if candidate.name == namespace.name && root_key == key {
                continue;
            }
            if let Ok(cached) = ctx.lookup(candidate, &root_key).await {
                warn!(
                    error = %err,
                    namespace = %candidate.name,
                    "navigation failed, serving cached root document"
                );
                return Served::cache(cached);
            }
        }
    }

    warn!(error = %err, "navigation failed with nothing cached, serving offline page");
    ctx.stats.record_offline_fallback("navigation");
    Served::fallback(fallback::offline_page(&ctx.config.branding))
}
