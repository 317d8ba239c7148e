//! `$include` resolution.
//!
//! # Responsibilities
//! - Find `$include` directives anywhere in a JSON/YAML document
//! - Merge the included documents' top-level fields into the including node
//! - Track `included path → dependents` so an edit to an included file
//!   reprocesses every document that embeds it
//!
//! # Design Decisions
//! - Explicit keys of the including node win over included ones; later
//!   entries of an include array win over earlier ones
//! - Unresolvable entries stay behind as a residual `$include` so the
//!   failure is visible and retried when the target appears
//! - Edges are recorded for every visited target, resolved or not
//! - Dependents are scheduled only when the included file itself changed,
//!   which keeps include cycles from looping
//! - Targets resolve within the including tenant's in-memory view only.
//!   Absolute entries may point anywhere inside that tenant (inherited
//!   documents included), but commons paths and other tenants never
//!   resolve and stay behind as a residual `$include`

use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::model::Configuration;
use crate::processors::format::DocumentFormat;
use crate::processors::{ProcessContext, ProcessOutput, Processor, ProcessorError};

/// Directive key.
pub const INCLUDE_KEY: &str = "$include";

const PRIORITY: i32 = 10;

/// Resolves `$include` directives and maintains the reverse dependency index.
#[derive(Debug, Default)]
pub struct IncludeProcessor {
    /// Included path → documents that include it.
    dependents: DashMap<String, BTreeSet<String>>,
    /// Including document → every path it visited.
    includes: DashMap<String, BTreeSet<String>>,
}

impl IncludeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents currently depending on `path`.
    pub fn dependents_of(&self, path: &str) -> BTreeSet<String> {
        self.dependents
            .get(path)
            .map(|deps| deps.value().clone())
            .unwrap_or_default()
    }

    /// Drop every outgoing edge of `path`.
    fn forget(&self, path: &str) {
        let Some((_, targets)) = self.includes.remove(path) else {
            return;
        };
        for target in targets {
            if let Some(mut deps) = self.dependents.get_mut(&target) {
                deps.remove(path);
            }
            self.dependents.remove_if(&target, |_, deps| deps.is_empty());
        }
    }

    fn remember(&self, path: &str, targets: BTreeSet<String>) {
        if targets.is_empty() {
            return;
        }
        for target in &targets {
            self.dependents
                .entry(target.clone())
                .or_default()
                .insert(path.to_string());
        }
        self.includes.insert(path.to_string(), targets);
    }
}

impl Processor for IncludeProcessor {
    fn name(&self) -> &'static str {
        "include"
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn supports(&self, doc: &Configuration) -> bool {
        DocumentFormat::from_path(doc.path()).is_some()
    }

    fn process(
        &self,
        doc: &Configuration,
        ctx: &ProcessContext<'_>,
    ) -> Result<ProcessOutput, ProcessorError> {
        let mut output = ProcessOutput::none();
        if ctx.changed {
            output.reprocess = self.dependents_of(doc.path());
        }
        self.forget(doc.path());

        if doc.is_blank() || !doc.content().contains(INCLUDE_KEY) {
            return Ok(output);
        }
        let Some(format) = DocumentFormat::from_path(doc.path()) else {
            return Ok(output);
        };
        let mut value = format.parse(doc.path(), doc.content())?;

        let mut resolver = Resolver {
            ctx,
            stack: vec![doc.path().to_string()],
            targets: BTreeSet::new(),
        };
        let rewritten = resolver.resolve(&mut value, doc.path());
        self.remember(doc.path(), resolver.targets);

        if rewritten {
            let content = format.render(doc.path(), &value)?;
            output
                .documents
                .push(Configuration::new(doc.path(), content));
        }
        Ok(output)
    }
}

/// One resolution pass over a document and everything it includes.
struct Resolver<'c, 'a> {
    ctx: &'c ProcessContext<'a>,
    /// Paths currently being expanded, for cycle detection.
    stack: Vec<String>,
    targets: BTreeSet<String>,
}

impl Resolver<'_, '_> {
    /// Resolve every directive inside `value`; true if anything changed.
    fn resolve(&mut self, value: &mut Value, base: &str) -> bool {
        match value {
            Value::Object(map) => {
                let mut changed = false;
                for (key, child) in map.iter_mut() {
                    if key != INCLUDE_KEY {
                        changed |= self.resolve(child, base);
                    }
                }
                if let Some(directive) = map.get(INCLUDE_KEY).cloned() {
                    changed |= self.expand(map, directive, base);
                }
                changed
            }
            Value::Array(items) => {
                let mut changed = false;
                for item in items.iter_mut() {
                    changed |= self.resolve(item, base);
                }
                changed
            }
            _ => false,
        }
    }

    fn expand(&mut self, map: &mut Map<String, Value>, directive: Value, base: &str) -> bool {
        let (entries, single) = match directive {
            Value::String(entry) => (vec![Value::String(entry)], true),
            Value::Array(entries) => (entries, false),
            _ => return false,
        };

        let mut merged = Map::new();
        let mut unresolved = Vec::new();
        let total = entries.len();
        for entry in entries {
            let fields = match &entry {
                Value::String(target) => self.load(target, base),
                _ => None,
            };
            match fields {
                Some(fields) => merged.extend(fields),
                None => unresolved.push(entry),
            }
        }
        if unresolved.len() == total {
            return false;
        }

        let own = std::mem::take(map);
        *map = merged;
        for (key, value) in own {
            if key != INCLUDE_KEY {
                map.insert(key, value);
            }
        }
        if !unresolved.is_empty() {
            let residual = if single {
                unresolved.remove(0)
            } else {
                Value::Array(unresolved)
            };
            map.insert(INCLUDE_KEY.to_string(), residual);
        }
        true
    }

    /// Fetch, parse and recursively resolve one include target.
    fn load(&mut self, entry: &str, base: &str) -> Option<Map<String, Value>> {
        let target = resolve_path(base, entry);
        self.targets.insert(target.clone());
        if self.stack.contains(&target) {
            tracing::warn!(path = %base, include = %target, "Include cycle detected");
            return None;
        }

        let doc = self.ctx.in_memory.get(&target)?;
        if doc.is_blank() {
            return None;
        }
        let format = DocumentFormat::from_path(&target)?;
        let mut value = match format.parse(&target, doc.content()) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(include = %target, error = %err, "Included document is not parseable");
                return None;
            }
        };

        self.stack.push(target.clone());
        self.resolve(&mut value, &target);
        self.stack.pop();

        match value {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Resolve `entry` against the directory of `base`. Absolute entries are
/// taken as-is. `.` and `..` segments are normalized.
pub fn resolve_path(base: &str, entry: &str) -> String {
    let joined = if entry.starts_with('/') {
        entry.to_string()
    } else {
        let dir = base.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        format!("{dir}/{entry}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathLayout;
    use serde_json::json;
    use std::collections::BTreeMap;

    const BASE: &str = "/config/tenants/MAIN";

    fn view(docs: &[(&str, &str)]) -> BTreeMap<String, Configuration> {
        docs.iter()
            .map(|(p, c)| (format!("{BASE}/{p}"), Configuration::new(format!("{BASE}/{p}"), *c)))
            .collect()
    }

    fn run(
        processor: &IncludeProcessor,
        in_memory: &BTreeMap<String, Configuration>,
        path: &str,
        changed: bool,
    ) -> ProcessOutput {
        let layout = PathLayout::default();
        let processed = BTreeMap::new();
        let ctx = ProcessContext {
            tenant: "MAIN",
            layout: &layout,
            in_memory,
            processed: &processed,
            changed,
        };
        let path = format!("{BASE}/{path}");
        let doc = in_memory
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Configuration::tombstone(path));
        processor.process(&doc, &ctx).unwrap()
    }

    fn parsed(output: &ProcessOutput) -> Value {
        serde_json::from_str(output.documents[0].content()).unwrap()
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/a/b/c.json", "d.json"), "/a/b/d.json");
        assert_eq!(resolve_path("/a/b/c.json", "../d.json"), "/a/d.json");
        assert_eq!(resolve_path("/a/b/c.json", "./x/d.json"), "/a/b/x/d.json");
        assert_eq!(resolve_path("/a/b/c.json", "/z/d.json"), "/z/d.json");
    }

    #[test]
    fn test_include_merges_fields_and_own_keys_win() {
        let processor = IncludeProcessor::new();
        let docs = view(&[
            ("a.json", r#"{"$include":"b.json","x":1,"y":0}"#),
            ("b.json", r#"{"y":2,"z":3}"#),
        ]);
        let out = run(&processor, &docs, "a.json", true);
        assert_eq!(parsed(&out), json!({"y": 0, "z": 3, "x": 1}));
        assert_eq!(
            processor.dependents_of(&format!("{BASE}/b.json")),
            BTreeSet::from([format!("{BASE}/a.json")])
        );
    }

    #[test]
    fn test_nested_directive_and_yaml_output() {
        let processor = IncludeProcessor::new();
        let docs = view(&[
            ("app.yml", "server:\n  $include: common/server.yml\n  port: 9000\n"),
            ("common/server.yml", "host: localhost\nport: 8080\n"),
        ]);
        let out = run(&processor, &docs, "app.yml", true);
        let value: Value = serde_yaml::from_str(out.documents[0].content()).unwrap();
        assert_eq!(value, json!({"server": {"host": "localhost", "port": 9000}}));
    }

    #[test]
    fn test_array_include_keeps_unresolved_residual() {
        let processor = IncludeProcessor::new();
        let docs = view(&[
            ("a.json", r#"{"$include":["b.json","missing.json","c.json"]}"#),
            ("b.json", r#"{"k":"b","only_b":true}"#),
            ("c.json", r#"{"k":"c"}"#),
        ]);
        let out = run(&processor, &docs, "a.json", true);
        assert_eq!(
            parsed(&out),
            json!({"k": "c", "only_b": true, "$include": ["missing.json"]})
        );
        // The missing target is tracked so its creation re-resolves a.json.
        assert!(processor
            .dependents_of(&format!("{BASE}/missing.json"))
            .contains(&format!("{BASE}/a.json")));
    }

    #[test]
    fn test_missing_target_leaves_document_untouched() {
        let processor = IncludeProcessor::new();
        let docs = view(&[("a.json", r#"{"$include":"b.json","x":1}"#)]);
        let out = run(&processor, &docs, "a.json", true);
        assert!(out.documents.is_empty());
    }

    #[test]
    fn test_absolute_targets_resolve_only_inside_the_tenant() {
        let processor = IncludeProcessor::new();
        let docs = view(&[
            ("a.json", r#"{"$include":["/config/tenants/MAIN/shared/b.json","/config/shared/c.json"]}"#),
            ("shared/b.json", r#"{"b":1}"#),
        ]);
        let out = run(&processor, &docs, "a.json", true);
        assert_eq!(parsed(&out), json!({"b": 1, "$include": ["/config/shared/c.json"]}));
    }

    #[test]
    fn test_transitive_includes_and_cycles() {
        let processor = IncludeProcessor::new();
        let docs = view(&[
            ("a.json", r#"{"$include":"b.json"}"#),
            ("b.json", r#"{"$include":"c.json","b":1}"#),
            ("c.json", r#"{"$include":"a.json","c":1}"#),
        ]);
        let out = run(&processor, &docs, "a.json", true);
        assert_eq!(parsed(&out), json!({"$include": "a.json", "c": 1, "b": 1}));
        assert!(processor
            .dependents_of(&format!("{BASE}/c.json"))
            .contains(&format!("{BASE}/a.json")));
    }

    #[test]
    fn test_changed_include_schedules_dependents() {
        let processor = IncludeProcessor::new();
        let docs = view(&[
            ("a.json", r#"{"$include":"b.json"}"#),
            ("b.json", r#"{"y":2}"#),
        ]);
        run(&processor, &docs, "a.json", true);

        let changed = run(&processor, &docs, "b.json", true);
        assert_eq!(changed.reprocess, BTreeSet::from([format!("{BASE}/a.json")]));

        let reprocessed = run(&processor, &docs, "b.json", false);
        assert!(reprocessed.reprocess.is_empty());
    }

    #[test]
    fn test_tombstone_drops_edges() {
        let processor = IncludeProcessor::new();
        let mut docs = view(&[
            ("a.json", r#"{"$include":"b.json"}"#),
            ("b.json", r#"{"y":2}"#),
        ]);
        run(&processor, &docs, "a.json", true);
        docs.remove(&format!("{BASE}/a.json"));
        let out = run(&processor, &docs, "a.json", true);
        assert!(out.documents.is_empty());
        assert!(processor.dependents_of(&format!("{BASE}/b.json")).is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let processor = IncludeProcessor::new();
        let layout = PathLayout::default();
        let empty = BTreeMap::new();
        let ctx = ProcessContext {
            tenant: "MAIN",
            layout: &layout,
            in_memory: &empty,
            processed: &empty,
            changed: true,
        };
        let doc = Configuration::new("/x.json", r#"{"$include": "#);
        assert!(matches!(
            processor.process(&doc, &ctx),
            Err(ProcessorError::Parse { .. })
        ));
    }
}
