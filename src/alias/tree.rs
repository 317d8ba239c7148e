//! Arena representation of the tenant alias tree.
//!
//! Nodes are stored in a flat map from tenant key to parent key; the children
//! index is derived and kept in sync on every edit. There are no back
//! pointers, so a cycle check is a walk up the parent chain.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::AliasError;

/// Immutable-once-published tree of tenant keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantAliasTree {
    parents: BTreeMap<String, Option<String>>,
    children: BTreeMap<String, Vec<String>>,
}

impl TenantAliasTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parents.contains_key(key)
    }

    /// All tenant keys in the tree.
    pub fn tenants(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }

    /// Add a root tenant. No-op if the tenant is already present.
    pub fn insert_root(&mut self, key: &str) {
        if !self.parents.contains_key(key) {
            self.parents.insert(key.to_string(), None);
        }
    }

    /// True if linking `child` below `parent` would make a tenant its own
    /// ancestor.
    pub fn would_cycle(&self, parent: &str, child: &str) -> bool {
        parent == child || self.ancestors(parent).contains(&child)
    }

    /// Link `child` below `parent`, moving `child` (with its subtree) if it
    /// already has a parent. `parent` is created as a root when unknown.
    pub fn link(&mut self, parent: &str, child: &str) -> Result<(), AliasError> {
        if self.would_cycle(parent, child) {
            return Err(AliasError::WrongAliasConfiguration(format!(
                "tenant {child} cannot be a child of its descendant {parent}"
            )));
        }
        self.insert_root(parent);

        if let Some(Some(previous)) = self.parents.get(child) {
            if let Some(siblings) = self.children.get_mut(previous) {
                siblings.retain(|k| k != child);
            }
        }

        self.parents
            .insert(child.to_string(), Some(parent.to_string()));
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        Ok(())
    }

    pub fn parent(&self, key: &str) -> Option<&str> {
        self.parents.get(key)?.as_deref()
    }

    pub fn children(&self, key: &str) -> &[String] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestors of `key`, nearest first.
    pub fn ancestors(&self, key: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.parent(key);
        while let Some(parent) = current {
            // link() keeps the tree acyclic; the bound only protects lookups
            // on trees assembled some other way.
            if chain.len() > self.parents.len() {
                break;
            }
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    /// All descendants of `key` in breadth-first order.
    pub fn descendants(&self, key: &str) -> Vec<&str> {
        let mut result = Vec::new();
        let mut queue: VecDeque<&str> = self.children(key).iter().map(String::as_str).collect();
        while let Some(next) = queue.pop_front() {
            result.push(next);
            queue.extend(self.children(next).iter().map(String::as_str));
        }
        result
    }

    /// Tenants (present in either tree) whose ancestor chain differs between
    /// `self` and `other`. These are the tenants whose inherited documents
    /// must be recomputed after an alias tree edit.
    pub fn rechained(&self, other: &TenantAliasTree) -> BTreeSet<String> {
        self.tenants()
            .chain(other.tenants())
            .filter(|key| self.ancestors(key) != other.ancestors(key))
            .map(str::to_string)
            .collect()
    }
}
