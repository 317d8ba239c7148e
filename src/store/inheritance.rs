//! Alias-tree inheritance of tenant documents.
//!
//! A tenant that does not persist a document sees a copy of the nearest
//! ancestor's persisted document at its own path. An own copy blocks
//! inheritance for the tenant and everything below it.

use crate::alias::TenantAliasTree;
use crate::model::Configuration;
use crate::store::batch::Batch;

/// Recompute inherited copies of `suffix` after `tenant` wrote it.
///
/// The writing tenant itself is refreshed too, so deleting an own override
/// falls back to the ancestor's copy.
pub(crate) fn propagate(batch: &mut Batch<'_>, tree: &TenantAliasTree, tenant: &str, suffix: &str) {
    refresh_one(batch, tree, tenant, suffix);
    for child in tree.children(tenant) {
        refresh(batch, tree, child, suffix);
    }
}

/// Recompute every inherited entry of tenants whose ancestor chain differs
/// between `old` and `new`.
pub(crate) fn rechain(batch: &mut Batch<'_>, old: &TenantAliasTree, new: &TenantAliasTree) {
    for tenant in old.rechained(new) {
        let mut suffixes = batch.inherited_suffixes(&tenant);
        for ancestor in new.ancestors(&tenant) {
            suffixes.extend(batch.persisted_suffixes(ancestor));
        }
        tracing::debug!(tenant = %tenant, documents = suffixes.len(), "Rechaining tenant");
        for suffix in suffixes {
            refresh_one(batch, new, &tenant, &suffix);
        }
    }
}

fn refresh(batch: &mut Batch<'_>, tree: &TenantAliasTree, tenant: &str, suffix: &str) {
    if !refresh_one(batch, tree, tenant, suffix) {
        return;
    }
    for child in tree.children(tenant) {
        refresh(batch, tree, child, suffix);
    }
}

/// Refresh the inherited copy of one tenant. Returns false when the tenant
/// persists its own document, which stops the descent.
fn refresh_one(batch: &mut Batch<'_>, tree: &TenantAliasTree, tenant: &str, suffix: &str) -> bool {
    let path = batch.layout().tenant_path(tenant, suffix);
    if batch.persisted(tenant, &path).is_some() {
        return false;
    }
    let inherited = nearest_ancestor_copy(batch, tree, tenant, suffix, &path);
    if batch.in_memory(tenant, &path) != inherited.as_ref() {
        batch.stage(tenant).set_inherited(&path, inherited);
    }
    true
}

fn nearest_ancestor_copy(
    batch: &Batch<'_>,
    tree: &TenantAliasTree,
    tenant: &str,
    suffix: &str,
    path: &str,
) -> Option<Configuration> {
    let layout = batch.layout();
    tree.ancestors(tenant).into_iter().find_map(|ancestor| {
        batch
            .persisted(ancestor, &layout.tenant_path(ancestor, suffix))
            .map(|doc| doc.relocated(path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathLayout;
    use crate::store::snapshot::StoreSnapshot;
    use std::sync::Arc;

    const SUFFIX: &str = "tenant-config.yml";

    fn path(tenant: &str) -> String {
        format!("/config/tenants/{tenant}/{SUFFIX}")
    }

    fn tree() -> TenantAliasTree {
        let mut tree = TenantAliasTree::new();
        tree.link("MAIN", "SUBMAIN").unwrap();
        tree.link("SUBMAIN", "LIFETENANT").unwrap();
        tree
    }

    fn write(batch: &mut Batch<'_>, tree: &TenantAliasTree, tenant: &str, content: &str) {
        batch
            .stage(tenant)
            .apply_update(&Configuration::new(path(tenant), content));
        propagate(batch, tree, tenant, SUFFIX);
    }

    fn visible(batch: &Batch<'_>, tenant: &str) -> Option<String> {
        batch
            .in_memory(tenant, &path(tenant))
            .map(|d| d.content().to_string())
    }

    #[test]
    fn test_inheritance_walks_down_and_stops_at_override() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let mut batch = Batch::new(&base);
        let tree = tree();

        write(&mut batch, &tree, "MAIN", "V1");
        assert_eq!(visible(&batch, "SUBMAIN").as_deref(), Some("V1"));
        assert_eq!(visible(&batch, "LIFETENANT").as_deref(), Some("V1"));

        write(&mut batch, &tree, "SUBMAIN", "V2");
        assert_eq!(visible(&batch, "MAIN").as_deref(), Some("V1"));
        assert_eq!(visible(&batch, "LIFETENANT").as_deref(), Some("V2"));

        write(&mut batch, &tree, "MAIN", "V3");
        assert_eq!(visible(&batch, "SUBMAIN").as_deref(), Some("V2"));
        assert_eq!(visible(&batch, "LIFETENANT").as_deref(), Some("V2"));
    }

    #[test]
    fn test_deleting_override_reinherits() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let mut batch = Batch::new(&base);
        let tree = tree();

        write(&mut batch, &tree, "MAIN", "V1");
        write(&mut batch, &tree, "SUBMAIN", "V2");
        write(&mut batch, &tree, "SUBMAIN", "");
        assert_eq!(visible(&batch, "SUBMAIN").as_deref(), Some("V1"));
        assert_eq!(visible(&batch, "LIFETENANT").as_deref(), Some("V1"));

        write(&mut batch, &tree, "MAIN", "");
        assert_eq!(visible(&batch, "SUBMAIN"), None);
        assert_eq!(visible(&batch, "LIFETENANT"), None);
    }

    #[test]
    fn test_rechain_moves_inherited_documents() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let mut batch = Batch::new(&base);
        let mut old = tree();
        old.insert_root("OTHER");

        write(&mut batch, &old, "MAIN", "main");
        write(&mut batch, &old, "OTHER", "other");

        let mut new = TenantAliasTree::new();
        new.link("MAIN", "SUBMAIN").unwrap();
        new.link("OTHER", "LIFETENANT").unwrap();
        rechain(&mut batch, &old, &new);

        assert_eq!(visible(&batch, "SUBMAIN").as_deref(), Some("main"));
        assert_eq!(visible(&batch, "LIFETENANT").as_deref(), Some("other"));

        rechain(&mut batch, &new, &TenantAliasTree::new());
        assert_eq!(visible(&batch, "LIFETENANT"), None);
    }
}
