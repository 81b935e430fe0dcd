//! Network-first handling for the news/data API, with an optional
//! stale-while-revalidate policy per namespace.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cache::{DataPolicy, RequestKey};
use crate::gateway::context::{GatewayContext, Served};
use crate::gateway::error::GatewayError;
use crate::gateway::fallback;
use crate::gateway::fetch::fetch_success;
use crate::gateway::request::GatewayRequest;

/// `refresh` is set for cache-busted requests: they never read the cache, and their
/// response replaces the canonical entry.
#[instrument(skip_all, fields(url = %request.url, class = "data-api", refresh))]
pub async fn handle(
    ctx: &Arc<GatewayContext>,
    request: GatewayRequest,
    key: RequestKey,
    refresh: bool,
) -> Served {
    let namespace = &ctx.namespaces.data;

    if !refresh && namespace.policy == DataPolicy::StaleWhileRevalidate {
        if let Ok(cached) = ctx.lookup(namespace, &key).await {
            if ctx.is_fresh(namespace, &cached) {
                debug!(outcome = "hit", policy = namespace.policy.as_str(), "serving cached data");
                spawn_refresh(Arc::clone(ctx), request, key);
                return Served::cache(cached);
            }
        }
    }

    let err = match fetch_success(ctx.fetcher.as_ref(), &request, ctx.config.api_timeout).await {
        Ok(response) => {
            let _ = ctx.store(namespace, &key, &response).await;
            return Served::network(response);
        }
        Err(err) => err,
    };

    ctx.note_network_failure(&err);

    if refresh {
        warn!(error = %err, kind = err.kind(), "forced refresh failed");
        return offline(ctx, &err);
    }

    match ctx.lookup(namespace, &key).await {
        Ok(cached) if ctx.is_fresh(namespace, &cached) => {
            warn!(
                error = %err,
                kind = err.kind(),
                "network failed, serving cached data"
            );
            Served::cache(cached)
        }
        Ok(_) => {
            warn!(error = %err, kind = err.kind(), "network failed and cached data is stale");
            offline(ctx, &err)
        }
        Err(miss) => {
            warn!(
                error = %err,
                kind = err.kind(),
                cache = miss.kind(),
                "network failed with nothing cached"
            );
            offline(ctx, &err)
        }
    }
}

fn offline(ctx: &GatewayContext, err: &GatewayError) -> Served {
    ctx.stats.record_offline_fallback("data-api");
    Served::fallback(fallback::offline_data(err, ctx.now()))
}

fn spawn_refresh(ctx: Arc<GatewayContext>, request: GatewayRequest, key: RequestKey) {
    tokio::spawn(async move {
        let namespace = &ctx.namespaces.data;
        match fetch_success(ctx.fetcher.as_ref(), &request, ctx.config.api_timeout).await {
            Ok(response) => {
                if ctx.store(namespace, &key, &response).await.is_ok() {
                    ctx.stats.record_revalidation();
                }
            }
            Err(err) => {
                ctx.note_network_failure(&err);
                debug!(key = %key, error = %err, "background refresh failed");
            }
        }
    });
}
