//! Durable backing store interface.
//!
//! Real deployments put a git repository or object store behind
//! [`BackingStore`]. [`InMemoryBackingStore`] keeps everything in memory and
//! is used by tests and by the daemon when seeded from a local directory.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::cache::types::{BackingError, BackingResult};
use crate::model::{content_hash, Configuration, VersionStamp};

/// Independently versioned store of whole documents.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Every document with the stamp they were read at.
    async fn find_all(&self) -> BackingResult<(VersionStamp, Vec<Configuration>)>;

    /// One document. Fails with [`BackingError::NotFound`] when absent.
    async fn find(&self, path: &str) -> BackingResult<(VersionStamp, Configuration)>;

    /// The current stamp, without reading documents.
    async fn head(&self) -> BackingResult<VersionStamp>;

    /// Save one document. When `expected_hash` is given it must match the
    /// hash of the currently stored content (or of empty content when the
    /// path is absent).
    async fn save(
        &self,
        doc: &Configuration,
        expected_hash: Option<&str>,
    ) -> BackingResult<VersionStamp>;

    async fn save_all(&self, docs: &[Configuration]) -> BackingResult<VersionStamp>;

    async fn delete(&self, path: &str) -> BackingResult<VersionStamp>;

    async fn delete_all(&self, paths: &[String]) -> BackingResult<VersionStamp>;

    /// True if `stamp` is already known locally, meaning a reader at that
    /// stamp is not ahead of this node. Only local commits and full reads
    /// make a stamp known; single-path reads and `head` do not.
    async fn has_version(&self, stamp: &VersionStamp) -> bool;
}

/// In-memory store with monotonic `v<N>` stamps.
#[derive(Debug, Default)]
pub struct InMemoryBackingStore {
    inner: tokio::sync::RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<String, Configuration>,
    sequence: u64,
    /// Stamps this node produced or has read.
    known: BTreeSet<String>,
}

impl Inner {
    fn stamp(&self) -> VersionStamp {
        VersionStamp::new(format!("v{}", self.sequence))
    }

    /// Advance the sequence. `local` stamps are known immediately.
    fn commit(&mut self, local: bool) -> VersionStamp {
        self.sequence += 1;
        let stamp = self.stamp();
        if local {
            self.known.insert(stamp.as_str().to_string());
        }
        stamp
    }

    /// Record that every document as of the current stamp was read.
    fn observe(&mut self) -> VersionStamp {
        let stamp = self.stamp();
        self.known.insert(stamp.as_str().to_string());
        stamp
    }

    fn put(&mut self, doc: &Configuration) {
        if doc.is_blank() {
            self.documents.remove(doc.path());
        } else {
            self.documents.insert(doc.path().to_string(), doc.clone());
        }
    }
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load initial documents. The resulting stamp is known locally.
    pub async fn seed(&self, docs: &[Configuration]) -> VersionStamp {
        let mut inner = self.inner.write().await;
        for doc in docs {
            inner.put(doc);
        }
        inner.commit(true)
    }

    /// Apply a change as another node would: the new stamp is not known
    /// locally until a full read.
    pub async fn commit_out_of_band(&self, docs: &[Configuration]) -> VersionStamp {
        let mut inner = self.inner.write().await;
        for doc in docs {
            inner.put(doc);
        }
        inner.commit(false)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Read every regular file under `dir`. A file at `dir/a/b.yml` becomes
    /// the document `/a/b.yml`.
    pub fn read_directory(dir: &Path) -> BackingResult<Vec<Configuration>> {
        let mut docs = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries = std::fs::read_dir(&current).map_err(|e| unavailable(&current, e))?;
            for entry in entries {
                let path = entry.map_err(|e| unavailable(&current, e))?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(dir) else {
                    continue;
                };
                let content = std::fs::read_to_string(&path).map_err(|e| unavailable(&path, e))?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                docs.push(Configuration::new(format!("/{name}"), content));
            }
        }
        docs.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(docs)
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> BackingError {
    BackingError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    async fn find_all(&self) -> BackingResult<(VersionStamp, Vec<Configuration>)> {
        let mut inner = self.inner.write().await;
        let docs = inner.documents.values().cloned().collect();
        Ok((inner.observe(), docs))
    }

    async fn find(&self, path: &str) -> BackingResult<(VersionStamp, Configuration)> {
        let inner = self.inner.read().await;
        let doc = inner
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| BackingError::NotFound(path.to_string()))?;
        Ok((inner.stamp(), doc))
    }

    async fn head(&self) -> BackingResult<VersionStamp> {
        Ok(self.inner.read().await.stamp())
    }

    async fn save(
        &self,
        doc: &Configuration,
        expected_hash: Option<&str>,
    ) -> BackingResult<VersionStamp> {
        let mut inner = self.inner.write().await;
        if let Some(expected) = expected_hash {
            let current = inner
                .documents
                .get(doc.path())
                .map(Configuration::content_hash)
                .unwrap_or_else(|| content_hash(""));
            if current != expected {
                return Err(BackingError::ConcurrentModification {
                    path: doc.path().to_string(),
                });
            }
        }
        inner.put(doc);
        Ok(inner.commit(true))
    }

    async fn save_all(&self, docs: &[Configuration]) -> BackingResult<VersionStamp> {
        let mut inner = self.inner.write().await;
        for doc in docs {
            inner.put(doc);
        }
        Ok(inner.commit(true))
    }

    async fn delete(&self, path: &str) -> BackingResult<VersionStamp> {
        let mut inner = self.inner.write().await;
        inner.documents.remove(path);
        Ok(inner.commit(true))
    }

    async fn delete_all(&self, paths: &[String]) -> BackingResult<VersionStamp> {
        let mut inner = self.inner.write().await;
        for path in paths {
            inner.documents.remove(path);
        }
        Ok(inner.commit(true))
    }

    async fn has_version(&self, stamp: &VersionStamp) -> bool {
        self.inner.read().await.known.contains(stamp.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, content: &str) -> Configuration {
        Configuration::new(path, content)
    }

    #[tokio::test]
    async fn test_stamps_are_monotonic_and_known() {
        let store = InMemoryBackingStore::new();
        let v1 = store.save(&doc("/a", "1"), None).await.unwrap();
        let v2 = store.save_all(&[doc("/b", "2"), doc("/c", "3")]).await.unwrap();
        assert_eq!(v1.as_str(), "v1");
        assert_eq!(v2.as_str(), "v2");
        assert!(store.has_version(&v1).await);

        let (stamp, docs) = store.find_all().await.unwrap();
        assert_eq!(stamp, v2);
        assert_eq!(docs.len(), 3);
    }

    #[tokio::test]
    async fn test_out_of_band_stamp_unknown_until_full_read() {
        let store = InMemoryBackingStore::new();
        let remote = store.commit_out_of_band(&[doc("/a", "1")]).await;
        assert!(!store.has_version(&remote).await);
        assert_eq!(store.head().await.unwrap(), remote);
        store.find("/a").await.unwrap();
        assert!(!store.has_version(&remote).await);

        store.find_all().await.unwrap();
        assert!(store.has_version(&remote).await);
    }

    #[tokio::test]
    async fn test_hash_precondition() {
        let store = InMemoryBackingStore::new();
        store
            .save(&doc("/a", "1"), Some(&content_hash("")))
            .await
            .unwrap();
        let err = store
            .save(&doc("/a", "2"), Some(&content_hash("stale")))
            .await
            .unwrap_err();
        assert_eq!(err, BackingError::ConcurrentModification { path: "/a".into() });
        store
            .save(&doc("/a", "2"), Some(&content_hash("1")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_missing_and_blank_save_deletes() {
        let store = InMemoryBackingStore::new();
        assert_eq!(
            store.find("/a").await.unwrap_err(),
            BackingError::NotFound("/a".into())
        );
        store.save(&doc("/a", "1"), None).await.unwrap();
        store.save(&doc("/a", "  "), None).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_read_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = dir.path().join("config/tenants/MAIN");
        std::fs::create_dir_all(&tenant).unwrap();
        std::fs::write(tenant.join("a.yml"), "a: 1").unwrap();
        std::fs::write(dir.path().join("root.json"), "{}").unwrap();

        let docs = InMemoryBackingStore::read_directory(dir.path()).unwrap();
        let paths: Vec<_> = docs.iter().map(Configuration::path).collect();
        assert_eq!(paths, vec!["/config/tenants/MAIN/a.yml", "/root.json"]);
    }
}
