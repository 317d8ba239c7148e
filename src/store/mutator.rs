//! The update pipeline entry point.

use arc_swap::ArcSwap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alias::{parse_alias_tree, TenantAliasTree};
use crate::model::{Configuration, PathLayout, COMMONS_TENANT};
use crate::observability::metrics;
use crate::processors::ProcessorChain;
use crate::store::batch::Batch;
use crate::store::lock::{MutationGuard, MutationLock};
use crate::store::snapshot::StoreSnapshot;
use crate::store::state::ConfigState;
use crate::store::types::StoreResult;
use crate::store::{inheritance, pipeline};

/// In-memory derivation store.
///
/// Writers are serialized by the [`MutationLock`]; readers load the current
/// [`StoreSnapshot`] without locking.
#[derive(Debug)]
pub struct ConfigStore {
    layout: Arc<PathLayout>,
    chain: ProcessorChain,
    lock: MutationLock,
    snapshot: ArcSwap<StoreSnapshot>,
}

impl ConfigStore {
    pub fn new(layout: PathLayout, chain: ProcessorChain, lock_timeout: Duration) -> Self {
        let layout = Arc::new(layout);
        Self {
            snapshot: ArcSwap::from_pointee(StoreSnapshot::empty(Arc::clone(&layout))),
            layout,
            chain,
            lock: MutationLock::new(lock_timeout),
        }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn lock(&self) -> &MutationLock {
        &self.lock
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.snapshot.load_full()
    }

    pub fn tenant_state(&self, tenant: &str) -> Option<Arc<ConfigState>> {
        self.snapshot.load().tenant(tenant).cloned()
    }

    pub fn get(&self, path: &str) -> Option<Configuration> {
        self.snapshot.load().get(path).cloned()
    }

    pub fn merged_view(&self) -> BTreeMap<String, Configuration> {
        self.snapshot.load().merged_view()
    }

    /// Check a batch for errors that would reject it, without the lock.
    pub fn validate(&self, docs: &[Configuration]) -> StoreResult<()> {
        self.alias_update(docs)?;
        Ok(())
    }

    /// Lock, apply and publish `docs`. Returns every changed path.
    pub async fn save_documents(&self, docs: &[Configuration]) -> StoreResult<BTreeSet<String>> {
        let guard = self.lock.acquire().await?;
        self.apply(&guard, docs)
    }

    /// Apply `docs` while the caller holds the mutation lock.
    ///
    /// Nothing is published if the batch is rejected; otherwise every
    /// touched tenant and the alias tree are published in one swap.
    pub fn apply(&self, _guard: &MutationGuard<'_>, docs: &[Configuration]) -> StoreResult<BTreeSet<String>> {
        let started = Instant::now();
        let new_tree = self.alias_update(docs)?;
        let base = self.snapshot.load_full();
        let mut batch = Batch::new(&base);

        let mut touched: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for doc in docs {
            let tenant = self.layout.tenant_of(doc.path());
            if !batch.stage(tenant).apply_update(doc) {
                continue;
            }
            if let Some(suffix) = self.layout.suffix_of(doc.path()) {
                touched
                    .entry(tenant.to_string())
                    .or_default()
                    .insert(suffix.to_string());
            }
        }

        let (tree, rechained) = match new_tree {
            Some(tree) if &tree != base.aliases() => (Arc::new(tree), true),
            _ => (base.aliases_arc(), false),
        };
        for (tenant, suffixes) in &touched {
            if tenant == COMMONS_TENANT {
                continue;
            }
            for suffix in suffixes {
                inheritance::propagate(&mut batch, &tree, tenant, suffix);
            }
        }
        if rechained {
            inheritance::rechain(&mut batch, base.aliases(), &tree);
        }

        let processed = pipeline::run(&mut batch, &self.chain);
        let (states, changed) = batch.finish();
        let tenants = states.len();
        let next = base.with_updates(tree, states);
        let tenant_count = next.tenant_keys().count();
        self.snapshot.store(Arc::new(next));

        let elapsed = started.elapsed();
        metrics::record_batch(changed.len(), elapsed);
        metrics::record_tenants(tenant_count);
        tracing::info!(
            documents = docs.len(),
            tenants,
            processed,
            changed = changed.len(),
            rechained,
            elapsed_ms = elapsed.as_millis() as u64,
            "Applied configuration batch"
        );
        Ok(changed)
    }

    /// The alias tree carried by the batch, if any. The last alias document
    /// in the batch wins.
    fn alias_update(&self, docs: &[Configuration]) -> StoreResult<Option<TenantAliasTree>> {
        let alias_path = self.layout.alias_path();
        match docs.iter().rev().find(|doc| doc.path() == alias_path) {
            Some(doc) => Ok(Some(parse_alias_tree(doc.content())?)),
            None => Ok(None),
        }
    }
}
