//! Count and age bounds for namespaces.
//!
//! Eviction is insertion ordered: storage lists keys oldest first and the head of that
//! list goes. Sweeps read the key list and then delete a subset, so a write racing a
//! sweep may be dropped one cycle early or survive one cycle longer.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use super::metadata::EntryMetadata;
use super::namespace::CacheNamespace;
use super::store::{CacheStorage, StorageError};

/// Deletions performed by one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries removed to satisfy `max_entries`.
    pub trimmed: usize,
    /// Entries removed for being older than the purge cutoff.
    pub purged: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.trimmed + self.purged
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.trimmed += other.trimmed;
        self.purged += other.purged;
    }
}

/// Delete the oldest entries of `namespace` until at most `max_entries` remain.
pub async fn trim(
    storage: &dyn CacheStorage,
    namespace: &CacheNamespace,
) -> Result<usize, StorageError> {
    let keys = storage.keys(&namespace.name).await?;
    let limit = namespace.max_entries.get();
    if keys.len() <= limit {
        return Ok(0);
    }

    let excess = keys.len() - limit;
    let mut removed = 0;
    for key in keys.iter().take(excess) {
        if storage.delete(&namespace.name, key).await? {
            removed += 1;
        }
    }

    debug!(
        namespace = %namespace.name,
        removed,
        limit,
        "trimmed namespace to entry bound"
    );
    Ok(removed)
}

/// Delete entries older than twice the namespace's `max_age` at `now`.
pub async fn purge_expired(
    storage: &dyn CacheStorage,
    metadata: &dyn EntryMetadata,
    namespace: &CacheNamespace,
    now: OffsetDateTime,
) -> Result<usize, StorageError> {
    purge_older_than(storage, metadata, namespace, expiry_cutoff(namespace, now)).await
}

pub(crate) fn expiry_cutoff(namespace: &CacheNamespace, now: OffsetDateTime) -> OffsetDateTime {
    let window = time::Duration::try_from(namespace.max_age.saturating_mul(2))
        .unwrap_or(time::Duration::MAX);
    now.checked_sub(window).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Delete entries stored before `cutoff`. Entries without a readable stamp count as expired.
pub async fn purge_older_than(
    storage: &dyn CacheStorage,
    metadata: &dyn EntryMetadata,
    namespace: &CacheNamespace,
    cutoff: OffsetDateTime,
) -> Result<usize, StorageError> {
    let keys = storage.keys(&namespace.name).await?;
    let mut removed = 0;

    for key in keys {
        let Some(entry) = storage.head(&namespace.name, &key).await? else {
            continue;
        };
        let expired = metadata
            .stored_at(&entry)
            .is_none_or(|stored_at| stored_at < cutoff);
        if expired && storage.delete(&namespace.name, &key).await? {
            removed += 1;
        }
    }

    if removed > 0 {
        debug!(
            namespace = %namespace.name,
            removed,
            cutoff = %cutoff,
            "purged expired entries"
        );
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::cache::metadata::HeaderStamp;
    use crate::cache::namespace::{DataPolicy, NamespaceLimits, Partition};
    use crate::cache::store::{MemoryStorage, StoredResponse};

    fn namespace(max_entries: usize) -> CacheNamespace {
        CacheNamespace::new(
            "test",
            "1",
            Partition::NewsData,
            NamespaceLimits {
                max_entries: NonZeroUsize::new(max_entries).unwrap(),
                max_age: Duration::from_secs(3600),
                policy: DataPolicy::NetworkFirst,
            },
        )
    }

    fn stamped(at: OffsetDateTime) -> StoredResponse {
        let mut response = StoredResponse::new(200, Vec::new(), "{}");
        HeaderStamp.stamp(&mut response, at);
        response
    }

    #[tokio::test]
    async fn trim_drops_oldest_first() {
        let store = MemoryStorage::new();
        let ns = namespace(2);
        for key in ["a", "b", "c", "d"] {
            store
                .put(&ns.name, key, StoredResponse::new(200, Vec::new(), key))
                .await
                .unwrap();
        }

        assert_eq!(trim(&store, &ns).await.unwrap(), 2);
        assert_eq!(store.keys(&ns.name).await.unwrap(), vec!["c", "d"]);
        assert_eq!(trim(&store, &ns).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purge_removes_old_and_unstamped_entries() {
        let store = MemoryStorage::new();
        let ns = namespace(10);
        store
            .put(&ns.name, "old", stamped(datetime!(2026-01-01 00:00 UTC)))
            .await
            .unwrap();
        store
            .put(&ns.name, "new", stamped(datetime!(2026-01-01 05:00 UTC)))
            .await
            .unwrap();
        store
            .put(&ns.name, "bare", StoredResponse::new(200, Vec::new(), "{}"))
            .await
            .unwrap();

        let removed = purge_older_than(
            &store,
            &HeaderStamp,
            &ns,
            datetime!(2026-01-01 04:00 UTC),
        )
        .await
        .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.keys(&ns.name).await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn purge_expired_uses_twice_max_age() {
        let store = MemoryStorage::new();
        let ns = namespace(10);
        let now = datetime!(2026-01-01 12:00 UTC);
        store
            .put(&ns.name, "older", stamped(datetime!(2026-01-01 09:59 UTC)))
            .await
            .unwrap();
        store
            .put(&ns.name, "younger", stamped(datetime!(2026-01-01 10:01 UTC)))
            .await
            .unwrap();

        assert_eq!(
            purge_expired(&store, &HeaderStamp, &ns, now).await.unwrap(),
            1
        );
        assert_eq!(store.keys(&ns.name).await.unwrap(), vec!["younger"]);
    }

    #[test]
    fn expiry_cutoff_saturates_for_huge_windows() {
        let ns = CacheNamespace::new(
            "test",
            "1",
            Partition::NewsData,
            NamespaceLimits {
                max_entries: NonZeroUsize::new(1).unwrap(),
                max_age: Duration::MAX,
                policy: DataPolicy::NetworkFirst,
            },
        );
        assert_eq!(
            expiry_cutoff(&ns, datetime!(2026-01-01 12:00 UTC)),
            OffsetDateTime::UNIX_EPOCH
        );
    }

    #[test]
    fn report_merges() {
        let mut report = SweepReport {
            trimmed: 1,
            purged: 2,
        };
        report.merge(SweepReport {
            trimmed: 3,
            purged: 0,
        });
        assert_eq!(report.total(), 6);
    }
}
