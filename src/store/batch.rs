//! Staging area for one update batch.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Configuration, PathLayout};
use crate::store::snapshot::StoreSnapshot;
use crate::store::state::{ConfigState, IntermediateConfigState};

/// Tenants staged from one base snapshot.
///
/// A tenant is staged on first write access and reused for the rest of the
/// batch. Lookups on tenants that were never staged read the base snapshot.
#[derive(Debug)]
pub(crate) struct Batch<'a> {
    layout: &'a PathLayout,
    base: &'a StoreSnapshot,
    staged: BTreeMap<String, IntermediateConfigState>,
}

impl<'a> Batch<'a> {
    pub fn new(base: &'a StoreSnapshot) -> Self {
        Self {
            layout: base.layout(),
            base,
            staged: BTreeMap::new(),
        }
    }

    pub fn layout(&self) -> &'a PathLayout {
        self.layout
    }

    /// Mutable staging copy of `tenant`, created from the base on first use.
    pub fn stage(&mut self, tenant: &str) -> &mut IntermediateConfigState {
        let base = self.base;
        self.staged
            .entry(tenant.to_string())
            .or_insert_with(|| match base.tenant(tenant) {
                Some(state) => IntermediateConfigState::from_state(state),
                None => IntermediateConfigState::from_state(&ConfigState::default()),
            })
    }

    pub fn staged_tenants(&self) -> impl Iterator<Item = &str> {
        self.staged.keys().map(String::as_str)
    }

    fn persisted_map(&self, tenant: &str) -> Option<&BTreeMap<String, Configuration>> {
        match self.staged.get(tenant) {
            Some(state) => Some(state.persisted()),
            None => self.base.tenant(tenant).map(|s| s.persisted()),
        }
    }

    fn in_memory_map(&self, tenant: &str) -> Option<&BTreeMap<String, Configuration>> {
        match self.staged.get(tenant) {
            Some(state) => Some(state.in_memory()),
            None => self.base.tenant(tenant).map(|s| s.in_memory()),
        }
    }

    pub fn persisted(&self, tenant: &str, path: &str) -> Option<&Configuration> {
        self.persisted_map(tenant)?.get(path)
    }

    pub fn in_memory(&self, tenant: &str, path: &str) -> Option<&Configuration> {
        self.in_memory_map(tenant)?.get(path)
    }

    /// Tenant-relative suffixes of everything `tenant` persists.
    pub fn persisted_suffixes(&self, tenant: &str) -> BTreeSet<String> {
        self.persisted_map(tenant)
            .into_iter()
            .flat_map(|docs| docs.keys())
            .filter_map(|path| self.layout.suffix_of(path))
            .map(str::to_string)
            .collect()
    }

    /// Suffixes `tenant` currently holds only through inheritance.
    pub fn inherited_suffixes(&self, tenant: &str) -> BTreeSet<String> {
        let Some(in_memory) = self.in_memory_map(tenant) else {
            return BTreeSet::new();
        };
        in_memory
            .keys()
            .filter(|path| self.persisted(tenant, path).is_none())
            .filter_map(|path| self.layout.suffix_of(path))
            .map(str::to_string)
            .collect()
    }

    /// Replace what `source` produced with `documents`, routing each
    /// derived document to the tenant owning its path.
    pub fn replace_outputs(&mut self, tenant: &str, source: &str, documents: Vec<Configuration>) {
        let layout = self.layout;
        let produced: BTreeSet<String> = documents.iter().map(|d| d.path().to_string()).collect();

        let state = self.stage(tenant);
        let previous = state.take_produced(source);
        state.record_produced(source, produced.clone());

        for stale in previous.difference(&produced) {
            self.stage(layout.tenant_of(stale)).drop_processed(stale);
        }
        for doc in documents {
            let owner = layout.tenant_of(doc.path()).to_string();
            self.stage(&owner).put_processed(doc);
        }
    }

    /// Freeze every staged tenant, returning the new states and the union
    /// of changed paths.
    pub fn finish(self) -> (BTreeMap<String, ConfigState>, BTreeSet<String>) {
        let mut states = BTreeMap::new();
        let mut changed = BTreeSet::new();
        for (tenant, staged) in self.staged {
            let (state, paths) = staged.into_state();
            changed.extend(paths);
            states.insert(tenant, state);
        }
        (states, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn doc(path: &str, content: &str) -> Configuration {
        Configuration::new(path, content)
    }

    #[test]
    fn test_stage_is_lazy_and_reads_fall_back_to_base() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let mut batch = Batch::new(&base);
        assert!(batch.persisted("MAIN", "/config/tenants/MAIN/a.yml").is_none());
        assert_eq!(batch.staged_tenants().count(), 0);

        batch
            .stage("MAIN")
            .apply_update(&doc("/config/tenants/MAIN/a.yml", "a"));
        assert!(batch.persisted("MAIN", "/config/tenants/MAIN/a.yml").is_some());
        assert_eq!(
            batch.persisted_suffixes("MAIN"),
            BTreeSet::from(["a.yml".to_string()])
        );
        assert!(batch.inherited_suffixes("MAIN").is_empty());
    }

    #[test]
    fn test_replace_outputs_routes_and_drops_stale() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let mut batch = Batch::new(&base);
        let source = "/config/tenants/MAIN/src.yml";
        batch.replace_outputs(
            "MAIN",
            source,
            vec![
                doc("/config/tenants/MAIN/out.yml", "1"),
                doc("/config/tenants/OTHER/out.yml", "2"),
            ],
        );
        batch.replace_outputs("MAIN", source, vec![doc("/config/tenants/MAIN/out.yml", "1")]);

        let (states, changed) = batch.finish();
        assert!(states["MAIN"].processed().contains_key("/config/tenants/MAIN/out.yml"));
        assert!(states["OTHER"].processed().is_empty());
        assert!(changed.contains("/config/tenants/OTHER/out.yml"));
    }
}
