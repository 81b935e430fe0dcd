//! Explicit gateway context.
//!
//! Built once at startup and handed to every handler. Handlers reach storage, the
//! network, metadata and the clock only through here.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::clock::Clock;
use super::config::GatewayConfig;
use super::error::GatewayError;
use super::fetch::Fetcher;
use super::stats::GatewayStats;
use crate::cache::{
    CacheNamespace, CacheStorage, EntryMetadata, Partition, RequestKey, StoredResponse, eviction,
};

/// Header reporting where a response came from.
pub const SOURCE_HEADER: &str = "x-newsgate-source";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
    PassThrough,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
            ResponseSource::PassThrough => "pass-through",
        }
    }
}

/// What the gateway answered with.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: StoredResponse,
    pub source: ResponseSource,
}

impl Served {
    pub fn network(response: StoredResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    pub fn cache(response: StoredResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Cache,
        }
    }

    pub fn fallback(response: StoredResponse) -> Self {
        Self {
            response,
            source: ResponseSource::Fallback,
        }
    }

    pub fn pass_through(response: StoredResponse) -> Self {
        Self {
            response,
            source: ResponseSource::PassThrough,
        }
    }
}

/// One namespace per partition, all at the current version.
#[derive(Debug, Clone)]
pub struct Namespaces {
    pub static_assets: CacheNamespace,
    pub data: CacheNamespace,
    pub pages: CacheNamespace,
}

impl Namespaces {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            static_assets: config.namespace(Partition::Static),
            data: config.namespace(Partition::NewsData),
            pages: config.namespace(Partition::Pages),
        }
    }

    pub fn get(&self, partition: Partition) -> &CacheNamespace {
        match partition {
            Partition::Static => &self.static_assets,
            Partition::NewsData => &self.data,
            Partition::Pages => &self.pages,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheNamespace> {
        [&self.static_assets, &self.data, &self.pages].into_iter()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.iter().any(|ns| ns.name == name)
    }
}

pub struct GatewayContext {
    pub config: GatewayConfig,
    pub namespaces: Namespaces,
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub metadata: Arc<dyn EntryMetadata>,
    pub clock: Arc<dyn Clock>,
    pub stats: GatewayStats,
}

impl GatewayContext {
    pub fn new(
        config: GatewayConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        metadata: Arc<dyn EntryMetadata>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let namespaces = Namespaces::from_config(&config);
        Self {
            config,
            namespaces,
            storage,
            fetcher,
            metadata,
            clock,
            stats: GatewayStats::new(),
        }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn key_for(&self, url: &url::Url) -> RequestKey {
        RequestKey::from_url(url, &self.config.refresh_params)
    }

    /// Read an entry. Storage failures degrade to a miss.
    pub async fn lookup(
        &self,
        namespace: &CacheNamespace,
        key: &RequestKey,
    ) -> Result<StoredResponse, GatewayError> {
        match self.storage.get(&namespace.name, key.as_str()).await {
            Ok(Some(entry)) => {
                self.stats.record_hit(namespace.partition);
                Ok(entry)
            }
            Ok(None) => {
                self.stats.record_miss(namespace.partition);
                Err(GatewayError::CacheMiss(key.to_string()))
            }
            Err(err) => {
                warn!(
                    namespace = %namespace.name,
                    key = %key,
                    error = %err,
                    "cache read failed, treating as miss"
                );
                self.stats.record_miss(namespace.partition);
                Err(GatewayError::Storage(err))
            }
        }
    }

    /// Whether `entry` is within the namespace's `max_age`. Unstamped entries are stale.
    pub fn is_fresh(&self, namespace: &CacheNamespace, entry: &StoredResponse) -> bool {
        let Some(stored_at) = self.metadata.stored_at(entry) else {
            return false;
        };
        let age = self.now() - stored_at;
        age <= namespace.max_age
    }

    /// Stamp and store a copy of `response`, then enforce the entry bound.
    ///
    /// Responses marked `no-store` or `private` are skipped, and `set-cookie` never
    /// reaches the cache. Caching is best effort: failures are logged and reported,
    /// never fatal.
    pub async fn store(
        &self,
        namespace: &CacheNamespace,
        key: &RequestKey,
        response: &StoredResponse,
    ) -> Result<(), GatewayError> {
        if response.forbids_shared_cache() {
            debug!(namespace = %namespace.name, key = %key, "response is not cacheable");
            return Ok(());
        }

        let mut entry = response.clone();
        entry.remove_header("set-cookie");
        self.metadata.stamp(&mut entry, self.now());

        if let Err(err) = self
            .storage
            .put(&namespace.name, key.as_str(), entry)
            .await
        {
            let err = GatewayError::from_storage(key.as_str(), err);
            self.stats.record_dropped_write();
            warn!(
                namespace = %namespace.name,
                key = %key,
                error = %err,
                kind = err.kind(),
                "cache write dropped"
            );
            return Err(err);
        }

        match eviction::trim(self.storage.as_ref(), namespace).await {
            Ok(removed) => self.stats.record_evictions(namespace.partition, removed),
            Err(err) => warn!(
                namespace = %namespace.name,
                error = %err,
                "entry bound enforcement failed"
            ),
        }

        debug!(namespace = %namespace.name, key = %key, "cached response");
        Ok(())
    }

    pub(crate) fn note_network_failure(&self, err: &GatewayError) {
        if err.is_network() {
            self.stats.record_network_failure(err.kind());
        }
    }
}
