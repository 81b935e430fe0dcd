//! Filesystem-backed cache storage.
//!
//! Layout: one directory per namespace under the root, one record per entry named by
//! the SHA-256 of its request key. A record is two lines: a JSON header (key, sequence,
//! status, headers) and the base64 body. Key listing and purges read only the header;
//! the sequence recovers insertion order after a restart.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheStorage, StorageError, StoredResponse};

const RECORD_EXTENSION: &str = "rec";

#[derive(Debug, Serialize, Deserialize)]
struct RecordHeader {
    key: String,
    sequence: u64,
    status: u16,
    headers: Vec<(String, String)>,
}

fn corrupt(namespace: &str, path: &Path, detail: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt {
        namespace: namespace.to_string(),
        detail: format!("{}: {detail}", path.display()),
    }
}

/// Cache storage rooted at a directory on disk.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
    quota_bytes: Option<u64>,
    last_sequence: AtomicU64,
    /// Serializes writers. Holds the bytes on disk once a quota check has measured them.
    usage: Mutex<Option<u64>>,
}

impl FsStorage {
    /// Open storage rooted at `root`, creating the directory if necessary.
    pub fn new(root: PathBuf, quota_bytes: Option<u64>) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            quota_bytes,
            last_sequence: AtomicU64::new(0),
            usage: Mutex::new(None),
        })
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, StorageError> {
        let valid = !namespace.is_empty()
            && namespace != "."
            && namespace != ".."
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self.root.join(namespace))
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let file = format!("{}.{RECORD_EXTENSION}", hex::encode(hasher.finalize()));
        Ok(self.namespace_dir(namespace)?.join(file))
    }

    /// Wall-clock microseconds, bumped so two writes never share a sequence.
    fn next_sequence(&self) -> u64 {
        let now = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000;
        let now = u64::try_from(now).unwrap_or(0);
        let previous = self
            .last_sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }

    /// First line of a record, without touching the body.
    async fn read_header(
        &self,
        namespace: &str,
        path: &Path,
    ) -> Result<Option<RecordHeader>, StorageError> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err)),
        };
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).await?;
        serde_json::from_str(line.trim_end())
            .map(Some)
            .map_err(|err| corrupt(namespace, path, err))
    }

    async fn read_record(
        &self,
        namespace: &str,
        path: &Path,
    ) -> Result<Option<(RecordHeader, Vec<u8>)>, StorageError> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err)),
        };
        let split = raw
            .iter()
            .position(|byte| *byte == b'\n')
            .ok_or_else(|| corrupt(namespace, path, "missing body line"))?;
        let header: RecordHeader =
            serde_json::from_slice(&raw[..split]).map_err(|err| corrupt(namespace, path, err))?;
        let body = STANDARD
            .decode(raw[split + 1..].trim_ascii_end())
            .map_err(|err| corrupt(namespace, path, format!("body is not base64: {err}")))?;
        Ok(Some((header, body)))
    }

    async fn file_len(path: &Path) -> u64 {
        fs::metadata(path).await.map(|meta| meta.len()).unwrap_or(0)
    }

    async fn measure(&self) -> Result<u64, StorageError> {
        let mut total = 0;
        let mut namespaces = fs::read_dir(&self.root).await?;
        while let Some(dir) = namespaces.next_entry().await? {
            if !dir.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(dir.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                total += entry.metadata().await?.len();
            }
        }
        debug!(root = %self.root.display(), bytes = total, "measured cache usage");
        Ok(total)
    }
}

#[async_trait]
impl CacheStorage for FsStorage {
    async fn namespaces(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, namespace: &str) -> Result<(), StorageError> {
        fs::create_dir_all(self.namespace_dir(namespace)?).await?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, StorageError> {
        let dir = self.namespace_dir(namespace)?;
        let mut usage = self.usage.lock().await;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                // Remeasured by the next quota check.
                *usage = None;
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                *usage = None;
                Err(StorageError::Io(err))
            }
        }
    }

    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<StoredResponse>, StorageError> {
        let path = self.entry_path(namespace, key)?;
        match self.read_record(namespace, &path).await? {
            Some((header, body)) if header.key == key => {
                Ok(Some(StoredResponse::new(header.status, header.headers, body)))
            }
            _ => Ok(None),
        }
    }

    async fn head(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<StoredResponse>, StorageError> {
        let path = self.entry_path(namespace, key)?;
        match self.read_header(namespace, &path).await? {
            Some(header) if header.key == key => Ok(Some(StoredResponse::new(
                header.status,
                header.headers,
                Bytes::new(),
            ))),
            _ => Ok(None),
        }
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        response: StoredResponse,
    ) -> Result<(), StorageError> {
        let dir = self.namespace_dir(namespace)?;
        let path = self.entry_path(namespace, key)?;
        let header = RecordHeader {
            key: key.to_string(),
            sequence: self.next_sequence(),
            status: response.status,
            headers: response.headers,
        };
        let mut payload = serde_json::to_vec(&header).map_err(|err| StorageError::Corrupt {
            namespace: namespace.to_string(),
            detail: format!("failed to encode `{key}`: {err}"),
        })?;
        payload.push(b'\n');
        payload.extend_from_slice(STANDARD.encode(&response.body).as_bytes());
        let needed = payload.len() as u64;

        let mut usage = self.usage.lock().await;
        let replaced = Self::file_len(&path).await;

        if let Some(quota) = self.quota_bytes {
            let used = match *usage {
                Some(used) => used,
                None => {
                    let used = self.measure().await?;
                    *usage = Some(used);
                    used
                }
            };
            let available = quota.saturating_sub(used.saturating_sub(replaced));
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }

        fs::create_dir_all(&dir).await?;
        let temp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&payload).await?;
            file.flush().await?;
            fs::rename(&temp, &path).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&temp).await;
            if err.kind() == std::io::ErrorKind::StorageFull {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: 0,
                });
            }
            return Err(StorageError::Io(err));
        }

        if let Some(used) = usage.as_mut() {
            *used = used.saturating_sub(replaced).saturating_add(needed);
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.entry_path(namespace, key)?;
        let mut usage = self.usage.lock().await;
        let freed = Self::file_len(&path).await;
        match fs::remove_file(&path).await {
            Ok(()) => {
                if let Some(used) = usage.as_mut() {
                    *used = used.saturating_sub(freed);
                }
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.namespace_dir(namespace)?;
        let mut listing = match fs::read_dir(&dir).await {
            Ok(listing) => listing,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::Io(err)),
        };

        let mut ordered = Vec::new();
        while let Some(entry) = listing.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match self.read_header(namespace, &path).await {
                Ok(Some(header)) => ordered.push((header.sequence, header.key)),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable cache record");
                }
            }
        }

        ordered.sort();
        Ok(ordered.into_iter().map(|(_, key)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn response(body: &'static str) -> StoredResponse {
        StoredResponse::new(
            200,
            vec![("content-type".to_string(), "application/json".to_string())],
            body,
        )
    }

    fn storage(dir: &TempDir) -> FsStorage {
        FsStorage::new(dir.path().join("cache"), None).expect("create storage")
    }

    #[tokio::test]
    async fn entries_survive_reopen_in_insertion_order() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = storage(&dir);
            store.put("ns", "https://a/1", response("1")).await.expect("put");
            store.put("ns", "https://a/2", response("2")).await.expect("put");
            store.put("ns", "https://a/1", response("3")).await.expect("re-put");
        }

        let store = storage(&dir);
        assert_eq!(
            store.keys("ns").await.expect("keys"),
            vec!["https://a/2", "https://a/1"]
        );
        let entry = store.get("ns", "https://a/1").await.expect("get").expect("entry");
        assert_eq!(entry.body, bytes::Bytes::from_static(b"3"));
        assert_eq!(entry.content_type(), Some("application/json"));
    }

    #[tokio::test]
    async fn binary_bodies_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = storage(&dir);
        let body = vec![0_u8, 159, 146, 150, 255];
        store
            .put("ns", "k", StoredResponse::new(200, Vec::new(), body.clone()))
            .await
            .expect("put");
        let entry = store.get("ns", "k").await.expect("get").expect("entry");
        assert_eq!(entry.body.as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn namespaces_are_listed_and_deleted() {
        let dir = TempDir::new().expect("tempdir");
        let store = storage(&dir);
        store.open("newsgate-static-v1").await.expect("open");
        store.open("newsgate-static-v2").await.expect("open");

        assert_eq!(
            store.namespaces().await.expect("list"),
            vec!["newsgate-static-v1", "newsgate-static-v2"]
        );
        assert!(store.delete_namespace("newsgate-static-v1").await.expect("delete"));
        assert!(!store.delete_namespace("newsgate-static-v1").await.expect("delete"));
        assert_eq!(
            store.namespaces().await.expect("list"),
            vec!["newsgate-static-v2"]
        );
    }

    #[tokio::test]
    async fn rejects_path_like_namespaces() {
        let dir = TempDir::new().expect("tempdir");
        let store = storage(&dir);
        for bad in ["", "..", "a/b", "../escape"] {
            let err = store.open(bad).await.expect_err("invalid namespace");
            assert!(matches!(err, StorageError::InvalidNamespace(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes() {
        let dir = TempDir::new().expect("tempdir");
        let store = FsStorage::new(dir.path().to_path_buf(), Some(64)).expect("storage");
        let big = StoredResponse::new(200, Vec::new(), vec![b'x'; 256]);
        let err = store.put("ns", "k", big).await.expect_err("quota");
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(store.keys("ns").await.expect("keys").is_empty());
    }

    #[tokio::test]
    async fn listing_and_head_do_not_decode_bodies() {
        let dir = TempDir::new().expect("tempdir");
        let store = storage(&dir);
        store.put("ns", "https://a/1", response("{}")).await.expect("put");
        store.put("ns", "https://a/2", response("{}")).await.expect("put");

        let path = store.entry_path("ns", "https://a/1").expect("path");
        let raw = std::fs::read_to_string(&path).expect("read record");
        let (header, _) = raw.split_once('\n').expect("two lines");
        std::fs::write(&path, format!("{header}\n%%% not base64 %%%")).expect("rewrite");

        assert_eq!(
            store.keys("ns").await.expect("keys"),
            vec!["https://a/1", "https://a/2"]
        );
        let head = store.head("ns", "https://a/1").await.expect("head").expect("entry");
        assert_eq!(head.status, 200);
        assert_eq!(head.content_type(), Some("application/json"));
        assert!(head.body.is_empty());

        let err = store.get("ns", "https://a/1").await.expect_err("body is corrupt");
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn quota_accounting_follows_writes_and_deletes() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("cache");
        let body = vec![b'x'; 300];
        let entry = || StoredResponse::new(200, Vec::new(), body.clone());

        let store = FsStorage::new(root.clone(), Some(700)).expect("storage");
        store.put("ns", "a", entry()).await.expect("first fits");
        store.put("ns", "a", entry()).await.expect("replacing frees the old copy");
        let err = store.put("ns", "b", entry()).await.expect_err("second exceeds quota");
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        drop(store);

        let reopened = FsStorage::new(root, Some(700)).expect("storage");
        let err = reopened
            .put("ns", "b", entry())
            .await
            .expect_err("usage is measured from disk");
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));

        assert!(reopened.delete("ns", "a").await.expect("delete"));
        reopened.put("ns", "b", entry()).await.expect("space was freed");

        assert!(reopened.delete_namespace("ns").await.expect("delete namespace"));
        reopened.put("other", "c", entry()).await.expect("namespace space was freed");
    }

    #[tokio::test]
    async fn missing_entries_and_namespaces_are_empty() {
        let dir = TempDir::new().expect("tempdir");
        let store = storage(&dir);
        assert!(store.get("ns", "k").await.expect("get").is_none());
        assert!(!store.delete("ns", "k").await.expect("delete"));
        assert!(store.keys("ns").await.expect("keys").is_empty());
    }
}
