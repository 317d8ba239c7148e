//! Ordered processor chain.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};

use crate::config::ProcessorConfig;
use crate::model::Configuration;
use crate::observability::metrics;
use crate::processors::{
    IncludeProcessor, ProcessContext, ProcessOutput, Processor, ProcessorError,
    SubstitutionProcessor,
};

/// Combined result of running the whole chain over one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutcome {
    /// Every document produced for the source, routed later by path. Holds
    /// the final rewritten source document when any processor changed it.
    pub documents: Vec<Configuration>,
    /// Paths requested for reprocessing.
    pub reprocess: BTreeSet<String>,
}

/// Processors sorted by priority, built once at startup.
#[derive(Debug, Default)]
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    /// Build a chain. Sorting is stable, so equal priorities keep
    /// registration order.
    pub fn new(mut processors: Vec<Box<dyn Processor>>) -> Self {
        processors.sort_by_key(|p| p.priority());
        Self { processors }
    }

    /// The default chain for a service configuration.
    pub fn from_config(config: &ProcessorConfig) -> Self {
        let mut processors: Vec<Box<dyn Processor>> = Vec::new();
        if config.include_enabled {
            processors.push(Box::new(IncludeProcessor::new()));
        }
        if config.substitution_enabled {
            processors.push(Box::new(SubstitutionProcessor::from_config(config)));
        }
        Self::new(processors)
    }

    /// Append a processor, keeping the order invariant.
    pub fn with(mut self, processor: Box<dyn Processor>) -> Self {
        self.processors.push(processor);
        Self::new(self.processors)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every supporting processor over `doc` in order.
    pub fn run(&self, doc: &Configuration, ctx: &ProcessContext<'_>) -> ChainOutcome {
        let mut current = doc.clone();
        let mut derived: BTreeMap<String, Configuration> = BTreeMap::new();
        let mut reprocess = BTreeSet::new();

        for processor in &self.processors {
            if !processor.supports(&current) {
                continue;
            }
            match guarded(processor.as_ref(), &current, ctx) {
                Ok(output) => {
                    reprocess.extend(output.reprocess);
                    for produced in output.documents.into_iter().chain(output.external) {
                        if produced.path() == current.path() {
                            current = produced;
                        } else {
                            derived.insert(produced.path().to_string(), produced);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        processor = processor.name(),
                        path = %doc.path(),
                        tenant = %ctx.tenant,
                        error = %err,
                        "Processor failed, passing document through"
                    );
                    metrics::record_processor_failure(processor.name());
                }
            }
        }

        reprocess.remove(doc.path());
        if doc.is_blank() {
            return ChainOutcome {
                documents: Vec::new(),
                reprocess,
            };
        }
        if current.content() != doc.content() {
            derived.insert(current.path().to_string(), current);
        }
        ChainOutcome {
            documents: derived.into_values().collect(),
            reprocess,
        }
    }
}

/// Run one processor, turning a panic into an error for that document only.
fn guarded(
    processor: &dyn Processor,
    doc: &Configuration,
    ctx: &ProcessContext<'_>,
) -> Result<ProcessOutput, ProcessorError> {
    panic::catch_unwind(AssertUnwindSafe(|| processor.process(doc, ctx))).unwrap_or_else(|payload| {
        Err(ProcessorError::Panicked {
            path: doc.path().to_string(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
