//! Per-tenant document layers.
//!
//! # Layers
//! - `persisted`: documents written for this tenant
//! - `in_memory`: `persisted` plus copies inherited from the nearest ancestor
//!   tenant that defines them
//! - `processed`: documents produced by the processor chain, keyed by their
//!   own path
//! - `produced_by_file`: source path → every path it produced
//!
//! # Design Decisions
//! - [`ConfigState`] is immutable once published; a batch clones it into an
//!   [`IntermediateConfigState`], mutates that, then converts it back
//! - `in_memory` beats `processed` on a path collision unless the processed
//!   document is the in-place rewrite of that same path

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Configuration;

/// Published, immutable document set of one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigState {
    persisted: BTreeMap<String, Configuration>,
    in_memory: BTreeMap<String, Configuration>,
    processed: BTreeMap<String, Configuration>,
    produced_by_file: BTreeMap<String, BTreeSet<String>>,
}

impl ConfigState {
    pub fn persisted(&self) -> &BTreeMap<String, Configuration> {
        &self.persisted
    }

    pub fn in_memory(&self) -> &BTreeMap<String, Configuration> {
        &self.in_memory
    }

    pub fn processed(&self) -> &BTreeMap<String, Configuration> {
        &self.processed
    }

    pub fn produced_by_file(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.produced_by_file
    }

    /// True if the processed document at `path` was produced by `path` itself.
    fn is_rewrite(&self, path: &str) -> bool {
        self.produced_by_file
            .get(path)
            .is_some_and(|produced| produced.contains(path))
    }

    /// Visible document at `path`.
    pub fn get(&self, path: &str) -> Option<&Configuration> {
        match (self.in_memory.get(path), self.processed.get(path)) {
            (Some(_), Some(derived)) if self.is_rewrite(path) => Some(derived),
            (Some(doc), _) => Some(doc),
            (None, derived) => derived,
        }
    }

    /// `in_memory` overlaid on `processed`.
    pub fn merged_view(&self) -> BTreeMap<String, Configuration> {
        let mut merged = self.processed.clone();
        for (path, doc) in &self.in_memory {
            if merged.contains_key(path) && self.is_rewrite(path) {
                continue;
            }
            merged.insert(path.clone(), doc.clone());
        }
        merged
    }

    /// Tombstones for every persisted path missing from `actual`, the
    /// authoritative document set of this tenant.
    pub fn calculate_deleted(&self, actual: &[Configuration]) -> Vec<Configuration> {
        let present: BTreeSet<&str> = actual.iter().map(Configuration::path).collect();
        self.persisted
            .keys()
            .filter(|path| !present.contains(path.as_str()))
            .map(Configuration::tombstone)
            .collect()
    }

    /// Persisted paths equal to or nested under any of `prefixes`.
    pub fn paths_under_prefix<'a, I>(&self, prefixes: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = BTreeSet::new();
        for prefix in prefixes {
            let folder = prefix.trim_end_matches('/');
            let nested = format!("{folder}/");
            if self.persisted.contains_key(folder) {
                result.insert(folder.to_string());
            }
            result.extend(
                self.persisted
                    .range(nested.clone()..)
                    .take_while(|(path, _)| path.starts_with(&nested))
                    .map(|(path, _)| path.clone()),
            );
        }
        result
    }
}

/// Mutable staging copy of a tenant's state during one batch.
#[derive(Debug, Clone)]
pub struct IntermediateConfigState {
    persisted: BTreeMap<String, Configuration>,
    in_memory: BTreeMap<String, Configuration>,
    processed: BTreeMap<String, Configuration>,
    produced_by_file: BTreeMap<String, BTreeSet<String>>,
    /// Every path whose visible content may have changed in this batch.
    changed_files: BTreeSet<String>,
    /// In-memory paths that changed and have not been processed yet.
    fresh: BTreeSet<String>,
}

impl IntermediateConfigState {
    pub fn from_state(state: &ConfigState) -> Self {
        Self {
            persisted: state.persisted.clone(),
            in_memory: state.in_memory.clone(),
            processed: state.processed.clone(),
            produced_by_file: state.produced_by_file.clone(),
            changed_files: BTreeSet::new(),
            fresh: BTreeSet::new(),
        }
    }

    pub fn persisted(&self) -> &BTreeMap<String, Configuration> {
        &self.persisted
    }

    pub fn in_memory(&self) -> &BTreeMap<String, Configuration> {
        &self.in_memory
    }

    pub fn processed(&self) -> &BTreeMap<String, Configuration> {
        &self.processed
    }

    pub fn changed_files(&self) -> &BTreeSet<String> {
        &self.changed_files
    }

    pub fn fresh(&self) -> &BTreeSet<String> {
        &self.fresh
    }

    fn touch(&mut self, path: &str) {
        self.changed_files.insert(path.to_string());
        self.fresh.insert(path.to_string());
    }

    /// Apply an authored write. Blank content removes the path from both
    /// `persisted` and `in_memory`. Returns false for a no-op write.
    pub fn apply_update(&mut self, doc: &Configuration) -> bool {
        let path = doc.path();
        if doc.is_blank() {
            if self.persisted.remove(path).is_none() {
                return false;
            }
            self.in_memory.remove(path);
        } else {
            if self.persisted.get(path) == Some(doc) {
                return false;
            }
            self.persisted.insert(path.to_string(), doc.clone());
            self.in_memory.insert(path.to_string(), doc.clone());
        }
        self.touch(path);
        true
    }

    /// Set (or clear) the inherited copy at `path`. Ignored when the tenant
    /// persists its own document there. Returns true if `in_memory` changed.
    pub fn set_inherited(&mut self, path: &str, inherited: Option<Configuration>) -> bool {
        if self.persisted.contains_key(path) {
            return false;
        }
        let changed = match inherited {
            Some(doc) => {
                if self.in_memory.get(path) == Some(&doc) {
                    false
                } else {
                    self.in_memory.insert(path.to_string(), doc);
                    true
                }
            }
            None => self.in_memory.remove(path).is_some(),
        };
        if changed {
            self.touch(path);
        }
        changed
    }

    /// Consume the fresh marker of `path`; true if it was fresh.
    pub fn take_fresh(&mut self, path: &str) -> bool {
        self.fresh.remove(path)
    }

    /// Forget what `source` produced, returning the previously produced paths.
    pub fn take_produced(&mut self, source: &str) -> BTreeSet<String> {
        self.produced_by_file.remove(source).unwrap_or_default()
    }

    pub fn record_produced(&mut self, source: &str, produced: BTreeSet<String>) {
        if !produced.is_empty() {
            self.produced_by_file.insert(source.to_string(), produced);
        }
    }

    /// Insert a derived document.
    pub fn put_processed(&mut self, doc: Configuration) {
        if self.processed.get(doc.path()) != Some(&doc) {
            self.changed_files.insert(doc.path().to_string());
            self.processed.insert(doc.path().to_string(), doc);
        }
    }

    /// Remove a derived document unless another source still produces it.
    pub fn drop_processed(&mut self, path: &str) {
        let still_produced = self
            .produced_by_file
            .values()
            .any(|produced| produced.contains(path));
        if !still_produced && self.processed.remove(path).is_some() {
            self.changed_files.insert(path.to_string());
        }
    }

    /// Freeze into a publishable snapshot, returning the changed paths.
    pub fn into_state(self) -> (ConfigState, BTreeSet<String>) {
        (
            ConfigState {
                persisted: self.persisted,
                in_memory: self.in_memory,
                processed: self.processed,
                produced_by_file: self.produced_by_file,
            },
            self.changed_files,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, content: &str) -> Configuration {
        Configuration::new(path, content)
    }

    fn state_with(docs: &[(&str, &str)]) -> ConfigState {
        let mut staged = IntermediateConfigState::from_state(&ConfigState::default());
        for (path, content) in docs {
            staged.apply_update(&doc(path, content));
        }
        staged.into_state().0
    }

    #[test]
    fn test_apply_update_is_idempotent() {
        let mut staged = IntermediateConfigState::from_state(&ConfigState::default());
        assert!(staged.apply_update(&doc("/t/a.yml", "a: 1")));
        let (state, changed) = staged.into_state();
        assert_eq!(changed.len(), 1);

        let mut again = IntermediateConfigState::from_state(&state);
        assert!(!again.apply_update(&doc("/t/a.yml", "a: 1")));
        assert!(again.changed_files().is_empty());
    }

    #[test]
    fn test_tombstone_removes_from_both_layers() {
        let state = state_with(&[("/t/a.yml", "a: 1")]);
        let mut staged = IntermediateConfigState::from_state(&state);
        assert!(staged.apply_update(&Configuration::tombstone("/t/a.yml")));
        assert!(staged.persisted().is_empty());
        assert!(staged.in_memory().is_empty());
        // Deleting an unknown path is a no-op.
        assert!(!staged.apply_update(&Configuration::tombstone("/t/missing.yml")));
    }

    #[test]
    fn test_inherited_copy_never_replaces_own_document() {
        let state = state_with(&[("/t/a.yml", "own")]);
        let mut staged = IntermediateConfigState::from_state(&state);
        assert!(!staged.set_inherited("/t/a.yml", Some(doc("/t/a.yml", "parent"))));
        assert_eq!(staged.in_memory()["/t/a.yml"].content(), "own");

        assert!(staged.set_inherited("/t/b.yml", Some(doc("/t/b.yml", "parent"))));
        assert!(!staged.set_inherited("/t/b.yml", Some(doc("/t/b.yml", "parent"))));
        assert!(staged.set_inherited("/t/b.yml", None));
        assert!(staged.fresh().contains("/t/b.yml"));
    }

    #[test]
    fn test_merged_view_precedence() {
        let mut staged = IntermediateConfigState::from_state(&ConfigState::default());
        staged.apply_update(&doc("/t/a.json", "raw"));
        staged.apply_update(&doc("/t/b.json", "authored"));
        // In-place rewrite of a.json by itself.
        staged.put_processed(doc("/t/a.json", "resolved"));
        staged.record_produced("/t/a.json", BTreeSet::from(["/t/a.json".to_string(), "/t/b.json".to_string()]));
        // a.json also derives b.json, which collides with an authored document.
        staged.put_processed(doc("/t/b.json", "derived"));
        staged.put_processed(doc("/t/c.json", "derived-only"));
        let (state, _) = staged.into_state();

        let merged = state.merged_view();
        assert_eq!(merged["/t/a.json"].content(), "resolved");
        assert_eq!(merged["/t/b.json"].content(), "authored");
        assert_eq!(merged["/t/c.json"].content(), "derived-only");
        assert_eq!(state.get("/t/a.json").map(Configuration::content), Some("resolved"));
        assert_eq!(state.get("/t/b.json").map(Configuration::content), Some("authored"));
    }

    #[test]
    fn test_drop_processed_respects_other_producers() {
        let mut staged = IntermediateConfigState::from_state(&ConfigState::default());
        staged.put_processed(doc("/t/shared.yml", "x"));
        staged.record_produced("/t/b.yml", BTreeSet::from(["/t/shared.yml".to_string()]));
        let _ = staged.take_produced("/t/a.yml");
        staged.drop_processed("/t/shared.yml");
        assert!(staged.processed().contains_key("/t/shared.yml"));

        let _ = staged.take_produced("/t/b.yml");
        staged.drop_processed("/t/shared.yml");
        assert!(staged.processed().is_empty());
    }

    #[test]
    fn test_calculate_deleted() {
        let state = state_with(&[("/t/a.yml", "a"), ("/t/b.yml", "b")]);
        let deleted = state.calculate_deleted(&[doc("/t/a.yml", "a")]);
        assert_eq!(deleted, vec![Configuration::tombstone("/t/b.yml")]);
        assert!(deleted[0].is_blank());
    }

    #[test]
    fn test_paths_under_prefix() {
        let state = state_with(&[
            ("/t/web/a.yml", "a"),
            ("/t/web/sub/b.yml", "b"),
            ("/t/webapp/c.yml", "c"),
            ("/t/other.yml", "d"),
        ]);
        let paths = state.paths_under_prefix(["/t/web"]);
        assert_eq!(
            paths.into_iter().collect::<Vec<_>>(),
            vec!["/t/web/a.yml".to_string(), "/t/web/sub/b.yml".to_string()]
        );
        let exact = state.paths_under_prefix(["/t/other.yml", "/t/web/"]);
        assert_eq!(exact.len(), 3);
    }
}
