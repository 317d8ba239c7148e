//! Versioned proxy cache in front of the backing store.
//!
//! # Responsibilities
//! - Serve reads from the published store snapshot, tagged with the backing
//!   store stamp it reflects
//! - Resync when a reader presents a stamp this node has not seen
//! - Route writes through the backing store, then the update pipeline
//! - Announce exactly once per successful write or refresh
//!
//! # Design Decisions
//! - Every backing store mutation and every refresh runs under the store's
//!   mutation lock, so the hash precondition is checked against the backing
//!   store while no other writer can interleave
//! - A batch is validated before anything is written to the backing store
//! - The cached stamp only advances when the cache provably reflects it:
//!   through a full resync, or a mutation made while the cache was at the
//!   backing store's head. Anything else falls back to a full resync

use arc_swap::ArcSwap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::cache::announce::ChangeAnnouncer;
use crate::cache::backing::BackingStore;
use crate::cache::types::{BackingError, CacheError, CacheResult};
use crate::model::{Configuration, VersionStamp};
use crate::observability::metrics;
use crate::store::{ConfigStore, MutationGuard, StoreSnapshot};

/// Stamp and the snapshot published for it.
#[derive(Debug, Clone)]
struct CacheView {
    stamp: Option<VersionStamp>,
    snapshot: Arc<StoreSnapshot>,
}

pub struct VersionedProxyCache {
    backing: Arc<dyn BackingStore>,
    store: Arc<ConfigStore>,
    announcer: Arc<dyn ChangeAnnouncer>,
    view: ArcSwap<CacheView>,
}

impl VersionedProxyCache {
    pub fn new(
        backing: Arc<dyn BackingStore>,
        store: Arc<ConfigStore>,
        announcer: Arc<dyn ChangeAnnouncer>,
    ) -> Self {
        let view = CacheView {
            stamp: None,
            snapshot: store.snapshot(),
        };
        Self {
            backing,
            store,
            announcer,
            view: ArcSwap::from_pointee(view),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Stamp of the last write or refresh, `None` before the first one.
    pub fn current_stamp(&self) -> Option<VersionStamp> {
        self.view.load().stamp.clone()
    }

    /// Merged view as of `requested` or later.
    pub async fn read(&self, requested: Option<&VersionStamp>) -> CacheResult<BTreeMap<String, Configuration>> {
        Ok(self.snapshot_for(requested).await?.merged_view())
    }

    /// One visible document.
    pub async fn get(&self, path: &str, requested: Option<&VersionStamp>) -> CacheResult<Configuration> {
        self.snapshot_for(requested)
            .await?
            .get(path)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(path.to_string()))
    }

    /// Merged view of one tenant.
    pub async fn get_tenant(
        &self,
        tenant: &str,
        requested: Option<&VersionStamp>,
    ) -> CacheResult<BTreeMap<String, Configuration>> {
        Ok(self.snapshot_for(requested).await?.tenant_view(tenant))
    }

    /// Save one document, optionally guarded by the hash of the content the
    /// caller last read.
    pub async fn write(&self, doc: Configuration, expected_hash: Option<&str>) -> CacheResult<BTreeSet<String>> {
        let docs = [doc];
        self.store.validate(&docs)?;
        let guard = self.store.lock().acquire().await?;
        let synced = self.is_synced().await?;
        let stamp = self.backing.save(&docs[0], expected_hash).await?;
        self.commit(&guard, synced, stamp, &docs).await
    }

    pub async fn write_all(&self, docs: &[Configuration]) -> CacheResult<BTreeSet<String>> {
        self.store.validate(docs)?;
        let guard = self.store.lock().acquire().await?;
        let synced = self.is_synced().await?;
        let stamp = self.backing.save_all(docs).await?;
        self.commit(&guard, synced, stamp, docs).await
    }

    /// Delete `path` and everything stored below it.
    pub async fn delete(&self, path: &str) -> CacheResult<BTreeSet<String>> {
        self.delete_all(&[path.to_string()]).await
    }

    /// Delete every path and everything stored below each of them.
    pub async fn delete_all(&self, paths: &[String]) -> CacheResult<BTreeSet<String>> {
        let guard = self.store.lock().acquire().await?;
        let mut targets = self.store.snapshot().paths_under_prefix(paths);
        targets.extend(paths.iter().cloned());
        let targets: Vec<String> = targets.into_iter().collect();

        let synced = self.is_synced().await?;
        let stamp = self.backing.delete_all(&targets).await?;
        let tombstones: Vec<Configuration> =
            targets.iter().map(Configuration::tombstone).collect();
        self.commit(&guard, synced, stamp, &tombstones).await
    }

    /// Resync every document from the backing store.
    pub async fn refresh_all(&self) -> CacheResult<BTreeSet<String>> {
        let guard = self.store.lock().acquire().await?;
        self.resync(&guard).await
    }

    /// Resync one path. A path missing from the backing store is deleted.
    ///
    /// When the backing store has moved past the cached stamp this becomes a
    /// full resync.
    pub async fn refresh_path(&self, path: &str) -> CacheResult<BTreeSet<String>> {
        let guard = self.store.lock().acquire().await?;
        let Some(stamp) = self.synced_stamp().await? else {
            return self.resync(&guard).await;
        };
        let doc = match self.backing.find(path).await {
            Ok((_, found)) => found,
            Err(BackingError::NotFound(_)) => Configuration::tombstone(path),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(stamp = %stamp, path = %path, "Resyncing configuration path");
        metrics::record_resync("path");
        self.apply_and_announce(&guard, stamp, &[doc])
    }

    /// Resync one tenant's folder, or everything when the backing store has
    /// moved past the cached stamp.
    pub async fn refresh_tenant(&self, tenant: &str) -> CacheResult<BTreeSet<String>> {
        let guard = self.store.lock().acquire().await?;
        let Some(stamp) = self.synced_stamp().await? else {
            return self.resync(&guard).await;
        };
        let (_, docs) = self.backing.find_all().await?;
        let prefix = self.store.layout().tenant_prefix(tenant);
        let mut docs: Vec<Configuration> = docs
            .into_iter()
            .filter(|doc| doc.path().starts_with(&prefix))
            .collect();
        if let Some(state) = self.store.tenant_state(tenant) {
            let deleted = state.calculate_deleted(&docs);
            docs.extend(deleted);
        }
        tracing::info!(stamp = %stamp, tenant = %tenant, documents = docs.len(), "Resyncing tenant");
        metrics::record_resync("tenant");
        self.apply_and_announce(&guard, stamp, &docs)
    }

    /// Returns the snapshot to serve for `requested`, resyncing first when
    /// the stamp is ahead of this node.
    async fn snapshot_for(&self, requested: Option<&VersionStamp>) -> CacheResult<Arc<StoreSnapshot>> {
        let view = self.view.load_full();
        let Some(requested) = requested.filter(|s| !s.as_str().is_empty()) else {
            return Ok(Arc::clone(&view.snapshot));
        };
        if view.stamp.as_ref() == Some(requested) || self.backing.has_version(requested).await {
            return Ok(Arc::clone(&view.snapshot));
        }
        tracing::info!(
            requested = %requested,
            current = ?view.stamp,
            "Requested stamp not known locally"
        );
        self.refresh_all().await?;
        Ok(Arc::clone(&self.view.load().snapshot))
    }

    /// The cached stamp, if it is still the backing store's head.
    async fn synced_stamp(&self) -> CacheResult<Option<VersionStamp>> {
        let head = self.backing.head().await?;
        Ok(self.current_stamp().filter(|stamp| *stamp == head))
    }

    async fn is_synced(&self) -> CacheResult<bool> {
        Ok(self.synced_stamp().await?.is_some())
    }

    /// Publish a backing store mutation. A cache that was behind before the
    /// mutation cannot vouch for `stamp`, so it catches up with a full resync.
    async fn commit(
        &self,
        guard: &MutationGuard<'_>,
        synced: bool,
        stamp: VersionStamp,
        docs: &[Configuration],
    ) -> CacheResult<BTreeSet<String>> {
        if synced {
            self.apply_and_announce(guard, stamp, docs)
        } else {
            tracing::info!(stamp = %stamp, current = ?self.current_stamp(), "Cache behind backing store");
            self.resync(guard).await
        }
    }

    /// Load every document, tombstone what disappeared, and adopt the stamp
    /// of that read.
    async fn resync(&self, guard: &MutationGuard<'_>) -> CacheResult<BTreeSet<String>> {
        let (stamp, mut docs) = self.backing.find_all().await?;
        let deleted = self.store.snapshot().calculate_deleted(&docs);
        tracing::info!(
            stamp = %stamp,
            documents = docs.len(),
            deleted = deleted.len(),
            "Resyncing all configuration"
        );
        docs.extend(deleted);
        metrics::record_resync("all");
        self.apply_and_announce(guard, stamp, &docs)
    }

    fn apply_and_announce(
        &self,
        guard: &MutationGuard<'_>,
        stamp: VersionStamp,
        docs: &[Configuration],
    ) -> CacheResult<BTreeSet<String>> {
        let changed = self.store.apply(guard, docs)?;
        self.view.store(Arc::new(CacheView {
            stamp: Some(stamp.clone()),
            snapshot: self.store.snapshot(),
        }));
        self.announcer.announce(&stamp, &changed);
        Ok(changed)
    }
}
