//! Persistent cache storage.
//!
//! The gateway talks to storage only through [`CacheStorage`], a key-value store of
//! request key to [`StoredResponse`] partitioned into named namespaces. Storage does not
//! track insertion time; it only guarantees that [`CacheStorage::keys`] lists a
//! namespace's keys oldest insertion first.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;

/// Response as held in the cache: status, headers and the untouched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace every value of `name` with a single `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Cache-Control` carries `no-store` or `private`.
    pub fn forbids_shared_cache(&self) -> bool {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("cache-control"))
            .flat_map(|(_, value)| value.split(','))
            .map(|directive| directive.trim())
            .any(|directive| {
                directive.eq_ignore_ascii_case("no-store") || directive.eq_ignore_ascii_case("private")
            })
    }

    /// Approximate footprint used for quota accounting.
    pub fn size_bytes(&self) -> u64 {
        let headers: usize = self
            .headers
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum();
        (headers + self.body.len()) as u64
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },
    #[error("invalid namespace name `{0}`")]
    InvalidNamespace(String),
    #[error("corrupt cache entry in `{namespace}`: {detail}")]
    Corrupt { namespace: String, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Host-side persistent store of request key → response, partitioned by namespace.
///
/// Writes replace whole entries; a re-put moves the key to the newest insertion slot.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every namespace currently present.
    async fn namespaces(&self) -> Result<Vec<String>, StorageError>;

    /// Create the namespace if it does not exist yet.
    async fn open(&self, namespace: &str) -> Result<(), StorageError>;

    /// Remove a namespace and all of its entries. Returns false if it did not exist.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool, StorageError>;

    async fn get(&self, namespace: &str, key: &str)
    -> Result<Option<StoredResponse>, StorageError>;

    /// Status and headers of an entry with an empty body. Stores that keep bodies apart
    /// override this to skip reading them.
    async fn head(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<StoredResponse>, StorageError> {
        Ok(self
            .get(namespace, key)
            .await?
            .map(|response| StoredResponse::new(response.status, response.headers, Bytes::new())))
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: StoredResponse,
    ) -> Result<(), StorageError>;

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError>;

    /// Keys of `namespace`, oldest insertion first. A missing namespace has no keys.
    async fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;
}

#[derive(Default)]
struct MemoryNamespace {
    next_seq: u64,
    entries: HashMap<String, (u64, StoredResponse)>,
}

impl MemoryNamespace {
    fn size_bytes(&self) -> u64 {
        self.entries
            .values()
            .map(|(_, response)| response.size_bytes())
            .sum()
    }
}

/// In-process store. Suitable for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStorage {
    quota_bytes: Option<u64>,
    namespaces: RwLock<HashMap<String, MemoryNamespace>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once the summed entry size would exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn namespaces(&self) -> Result<Vec<String>, StorageError> {
        let guard = self.namespaces.read().await;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn open(&self, namespace: &str) -> Result<(), StorageError> {
        let mut guard = self.namespaces.write().await;
        guard.entry(namespace.to_string()).or_default();
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, StorageError> {
        let mut guard = self.namespaces.write().await;
        Ok(guard.remove(namespace).is_some())
    }

    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<StoredResponse>, StorageError> {
        let guard = self.namespaces.read().await;
        Ok(guard
            .get(namespace)
            .and_then(|ns| ns.entries.get(key))
            .map(|(_, response)| response.clone()))
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: StoredResponse,
    ) -> Result<(), StorageError> {
        let mut guard = self.namespaces.write().await;

        if let Some(quota) = self.quota_bytes {
            let replaced = guard
                .get(namespace)
                .and_then(|ns| ns.entries.get(key))
                .map(|(_, existing)| existing.size_bytes())
                .unwrap_or(0);
            let used: u64 = guard.values().map(MemoryNamespace::size_bytes).sum();
            let available = quota.saturating_sub(used.saturating_sub(replaced));
            let needed = response.size_bytes();
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }

        let ns = guard.entry(namespace.to_string()).or_default();
        let seq = ns.next_seq;
        ns.next_seq += 1;
        ns.entries.insert(key.to_string(), (seq, response));
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        let mut guard = self.namespaces.write().await;
        Ok(guard
            .get_mut(namespace)
            .is_some_and(|ns| ns.entries.remove(key).is_some()))
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        let guard = self.namespaces.read().await;
        let Some(ns) = guard.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut ordered: Vec<(u64, &String)> = ns
            .entries
            .iter()
            .map(|(key, (seq, _))| (*seq, key))
            .collect();
        ordered.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(ordered.into_iter().map(|(_, key)| key.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static str) -> StoredResponse {
        StoredResponse::new(
            200,
            vec![("Content-Type".to_string(), "text/plain".to_string())],
            body,
        )
    }

    #[test]
    fn cache_control_directives_are_matched_case_insensitively() {
        let with = |value: &str| {
            StoredResponse::new(200, vec![("Cache-Control".to_string(), value.to_string())], "")
        };
        assert!(with("no-store").forbids_shared_cache());
        assert!(with("max-age=60, Private").forbids_shared_cache());
        assert!(!with("public, max-age=600").forbids_shared_cache());
        assert!(!with("no-cache").forbids_shared_cache());
        assert!(!response("plain").forbids_shared_cache());
    }

    #[tokio::test]
    async fn keys_follow_insertion_order() {
        let store = MemoryStorage::new();
        store.put("ns", "a", response("1")).await.unwrap();
        store.put("ns", "b", response("2")).await.unwrap();
        store.put("ns", "c", response("3")).await.unwrap();

        assert_eq!(store.keys("ns").await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn re_put_moves_key_to_newest_slot() {
        let store = MemoryStorage::new();
        store.put("ns", "a", response("1")).await.unwrap();
        store.put("ns", "b", response("2")).await.unwrap();
        store.put("ns", "a", response("3")).await.unwrap();

        assert_eq!(store.keys("ns").await.unwrap(), vec!["b", "a"]);
        let stored = store.get("ns", "a").await.unwrap().expect("entry");
        assert_eq!(stored.body, Bytes::from("3"));
    }

    #[tokio::test]
    async fn delete_namespace_removes_entries() {
        let store = MemoryStorage::new();
        store.put("old", "a", response("1")).await.unwrap();
        store.open("new").await.unwrap();

        assert!(store.delete_namespace("old").await.unwrap());
        assert!(!store.delete_namespace("old").await.unwrap());
        assert_eq!(store.namespaces().await.unwrap(), vec!["new"]);
        assert!(store.get("old", "a").await.unwrap().is_none());
        assert!(store.keys("old").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_rejects_oversized_write() {
        let store = MemoryStorage::with_quota(40);
        store.put("ns", "a", response("small")).await.unwrap();

        let big = StoredResponse::new(200, Vec::new(), vec![b'x'; 64]);
        let err = store.put("ns", "b", big).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(store.keys("ns").await.unwrap(), vec!["a"]);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut stored = response("x");
        assert_eq!(stored.content_type(), Some("text/plain"));

        stored.set_header("content-type", "text/css");
        assert_eq!(stored.header("CONTENT-TYPE"), Some("text/css"));
        assert_eq!(stored.headers.len(), 1);

        stored.remove_header("Content-Type");
        assert!(stored.content_type().is_none());
    }
}
