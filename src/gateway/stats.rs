//! Gateway counters.
//!
//! Each event bumps an in-process atomic (reported through the status message) and the
//! matching `metrics` counter for whatever recorder the binary installed.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;

use crate::cache::Partition;

#[derive(Debug, Default)]
pub struct GatewayStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    network_failures: AtomicU64,
    offline_fallbacks: AtomicU64,
    revalidations: AtomicU64,
    dropped_writes: AtomicU64,
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub network_failures: u64,
    pub offline_fallbacks: u64,
    pub revalidations: u64,
    pub dropped_writes: u64,
    /// Percentage of lookups served from cache.
    pub hit_rate: f64,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, partition: Partition) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("newsgate_cache_hit_total", "namespace" => partition.as_str()).increment(1);
    }

    pub fn record_miss(&self, partition: Partition) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("newsgate_cache_miss_total", "namespace" => partition.as_str()).increment(1);
    }

    pub fn record_evictions(&self, partition: Partition, count: usize) {
        if count == 0 {
            return;
        }
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        counter!("newsgate_cache_evict_total", "namespace" => partition.as_str())
            .increment(count as u64);
    }

    pub fn record_network_failure(&self, kind: &'static str) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
        counter!("newsgate_network_failure_total", "kind" => kind).increment(1);
    }

    pub fn record_offline_fallback(&self, class: &'static str) {
        self.offline_fallbacks.fetch_add(1, Ordering::Relaxed);
        counter!("newsgate_offline_fallback_total", "class" => class).increment(1);
    }

    pub fn record_revalidation(&self) {
        self.revalidations.fetch_add(1, Ordering::Relaxed);
        counter!("newsgate_revalidate_total").increment(1);
    }

    pub fn record_dropped_write(&self) {
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        counter!("newsgate_cache_write_dropped_total").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64 * 100.0
        };

        StatsSnapshot {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            offline_fallbacks: self.offline_fallbacks.load(Ordering::Relaxed),
            revalidations: self.revalidations.load(Ordering::Relaxed),
            dropped_writes: self.dropped_writes.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}
