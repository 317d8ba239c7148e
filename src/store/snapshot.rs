//! Store-wide published snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::alias::TenantAliasTree;
use crate::model::{Configuration, PathLayout};
use crate::store::state::ConfigState;

/// Every tenant's [`ConfigState`] plus the alias tree they were derived with.
///
/// Published as one value so a reader never sees a tenant's new documents
/// next to another tenant's half-applied update from the same batch.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    layout: Arc<PathLayout>,
    aliases: Arc<TenantAliasTree>,
    tenants: BTreeMap<String, Arc<ConfigState>>,
}

impl StoreSnapshot {
    pub fn empty(layout: Arc<PathLayout>) -> Self {
        Self {
            layout,
            aliases: Arc::new(TenantAliasTree::new()),
            tenants: BTreeMap::new(),
        }
    }

    /// Copy of this snapshot with some tenants and the alias tree replaced.
    pub(crate) fn with_updates(
        &self,
        aliases: Arc<TenantAliasTree>,
        updated: BTreeMap<String, ConfigState>,
    ) -> Self {
        let mut tenants = self.tenants.clone();
        for (tenant, state) in updated {
            tenants.insert(tenant, Arc::new(state));
        }
        Self {
            layout: Arc::clone(&self.layout),
            aliases,
            tenants,
        }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn aliases(&self) -> &TenantAliasTree {
        &self.aliases
    }

    pub(crate) fn aliases_arc(&self) -> Arc<TenantAliasTree> {
        Arc::clone(&self.aliases)
    }

    pub fn tenant(&self, tenant: &str) -> Option<&Arc<ConfigState>> {
        self.tenants.get(tenant)
    }

    pub fn tenant_keys(&self) -> impl Iterator<Item = &str> {
        self.tenants.keys().map(String::as_str)
    }

    /// Visible document at `path`.
    pub fn get(&self, path: &str) -> Option<&Configuration> {
        self.tenants.get(self.layout.tenant_of(path))?.get(path)
    }

    /// Merged view of a single tenant.
    pub fn tenant_view(&self, tenant: &str) -> BTreeMap<String, Configuration> {
        self.tenants
            .get(tenant)
            .map(|state| state.merged_view())
            .unwrap_or_default()
    }

    /// Merged view across all tenants.
    pub fn merged_view(&self) -> BTreeMap<String, Configuration> {
        self.tenants
            .values()
            .flat_map(|state| state.merged_view())
            .collect()
    }

    /// Persisted paths equal to or nested under any prefix, in any tenant.
    pub fn paths_under_prefix(&self, prefixes: &[String]) -> BTreeSet<String> {
        self.tenants
            .values()
            .flat_map(|state| state.paths_under_prefix(prefixes.iter().map(String::as_str)))
            .collect()
    }

    /// Tombstones for every persisted path absent from `actual`, the full
    /// authoritative document set.
    pub fn calculate_deleted(&self, actual: &[Configuration]) -> Vec<Configuration> {
        self.tenants
            .values()
            .flat_map(|state| state.calculate_deleted(actual))
            .collect()
    }

    /// Persisted document count across tenants.
    pub fn persisted_count(&self) -> usize {
        self.tenants.values().map(|s| s.persisted().len()).sum()
    }
}
