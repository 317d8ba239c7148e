//! Fixed-point processing loop.
//!
//! Each round runs the chain over a per-tenant worklist and returns the next
//! round's worklist built from the reprocess requests. The loop ends when a
//! round schedules nothing. Termination relies on processors scheduling
//! dependents only for documents whose content changed, and each document
//! changes at most once per batch.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Configuration;
use crate::processors::{ProcessContext, ProcessorChain};
use crate::store::batch::Batch;

/// Tenant → paths to process in the next round.
pub(crate) type Worklist = BTreeMap<String, BTreeSet<String>>;

/// Run the chain until no more documents are scheduled. Returns the number
/// of documents processed.
pub(crate) fn run(batch: &mut Batch<'_>, chain: &ProcessorChain) -> usize {
    let mut worklist = initial_worklist(batch);
    let mut processed = 0;
    let mut rounds = 0;
    while !worklist.is_empty() {
        rounds += 1;
        processed += worklist.values().map(BTreeSet::len).sum::<usize>();
        worklist = run_round(batch, chain, worklist);
    }
    if processed > 0 {
        tracing::debug!(rounds, documents = processed, "Processor chain reached fixed point");
    }
    processed
}

/// Every in-memory path that changed since staging.
fn initial_worklist(batch: &mut Batch<'_>) -> Worklist {
    let tenants: Vec<String> = batch.staged_tenants().map(str::to_string).collect();
    tenants
        .into_iter()
        .filter_map(|tenant| {
            let fresh = batch.stage(&tenant).fresh().clone();
            (!fresh.is_empty()).then_some((tenant, fresh))
        })
        .collect()
}

/// Process one round and return the next.
pub(crate) fn run_round(batch: &mut Batch<'_>, chain: &ProcessorChain, worklist: Worklist) -> Worklist {
    let layout = batch.layout();
    let mut next = Worklist::new();
    for (tenant, paths) in worklist {
        for path in paths {
            for request in process_one(batch, chain, &tenant, &path) {
                let owner = layout.tenant_of(&request);
                // Only documents the store already knows can be reprocessed.
                if batch.in_memory(owner, &request).is_some() {
                    next.entry(owner.to_string()).or_default().insert(request);
                }
            }
        }
    }
    next
}

fn process_one(
    batch: &mut Batch<'_>,
    chain: &ProcessorChain,
    tenant: &str,
    path: &str,
) -> BTreeSet<String> {
    let layout = batch.layout();
    let state = batch.stage(tenant);
    let changed = state.take_fresh(path);
    let doc = state
        .in_memory()
        .get(path)
        .cloned()
        .unwrap_or_else(|| Configuration::tombstone(path));

    let ctx = ProcessContext {
        tenant,
        layout,
        in_memory: state.in_memory(),
        processed: state.processed(),
        changed,
    };
    let outcome = chain.run(&doc, &ctx);
    batch.replace_outputs(tenant, path, outcome.documents);
    outcome.reprocess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PathLayout;
    use crate::processors::IncludeProcessor;
    use crate::store::snapshot::StoreSnapshot;
    use std::sync::Arc;

    fn chain() -> ProcessorChain {
        ProcessorChain::new(vec![Box::new(IncludeProcessor::new())])
    }

    fn write(batch: &mut Batch<'_>, path: &str, content: &str) {
        let tenant = batch.layout().tenant_of(path).to_string();
        batch
            .stage(&tenant)
            .apply_update(&Configuration::new(path, content));
    }

    #[test]
    fn test_round_returns_dependents_as_next_worklist() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let chain = chain();
        let mut batch = Batch::new(&base);
        write(&mut batch, "/config/tenants/T/a.json", r#"{"$include":"b.json","x":1}"#);
        write(&mut batch, "/config/tenants/T/b.json", r#"{"y":2}"#);
        assert_eq!(run(&mut batch, &chain), 3);

        let (states, _) = batch.finish();
        let a = states["T"].get("/config/tenants/T/a.json").unwrap();
        let value: serde_json::Value = serde_json::from_str(a.content()).unwrap();
        assert_eq!(value, serde_json::json!({"y": 2, "x": 1}));
    }

    #[test]
    fn test_include_cycle_terminates() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let chain = chain();
        let mut batch = Batch::new(&base);
        write(&mut batch, "/config/tenants/T/a.json", r#"{"$include":"b.json","a":1}"#);
        write(&mut batch, "/config/tenants/T/b.json", r#"{"$include":"a.json","b":1}"#);
        let processed = run(&mut batch, &chain);
        assert!(processed <= 4);
    }

    #[test]
    fn test_reprocess_requests_for_unknown_paths_are_ignored() {
        let base = StoreSnapshot::empty(Arc::new(PathLayout::default()));
        let chain = chain();
        let mut batch = Batch::new(&base);
        write(&mut batch, "/config/tenants/T/a.json", r#"{"$include":"missing.json"}"#);
        run(&mut batch, &chain);

        let mut worklist = Worklist::new();
        worklist.insert(
            "T".to_string(),
            BTreeSet::from(["/config/tenants/T/missing.json".to_string()]),
        );
        assert!(run_round(&mut batch, &chain, worklist).is_empty());
    }
}
