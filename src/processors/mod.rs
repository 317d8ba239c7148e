//! Processor chain.
//!
//! # Data Flow
//! ```text
//! changed document (in-memory layer)
//!     → chain.rs (priority order, lowest first)
//!         → include.rs       ($include resolution + reverse dependency index)
//!         → substitution.rs  (${...} from tenant profile + environment)
//!         → scripted.rs      (external script engine, tenant-scoped)
//!     → ChainOutcome { documents, reprocess }
//!     → store pipeline (next round = reprocess worklist)
//! ```
//!
//! # Design Decisions
//! - Statically registered list, sorted once by priority (stable on ties)
//! - A processor returning the source path rewrites the working copy in
//!   place for the processors after it; other paths are derived documents
//! - Failures are contained per (document, processor): logged, counted,
//!   and the working copy passes through unchanged

pub mod chain;
pub mod format;
pub mod include;
pub mod scripted;
pub mod substitution;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::model::{Configuration, PathLayout};

pub use chain::{ChainOutcome, ProcessorChain};
pub use include::IncludeProcessor;
pub use scripted::{ScriptEngine, ScriptedProcessor};
pub use substitution::SubstitutionProcessor;

/// Read-only view handed to a processor for one document.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    /// Tenant owning the document.
    pub tenant: &'a str,
    pub layout: &'a PathLayout,
    /// The tenant's current in-memory layer (authored + inherited).
    pub in_memory: &'a BTreeMap<String, Configuration>,
    /// The tenant's current processed layer.
    pub processed: &'a BTreeMap<String, Configuration>,
    /// True when the document's in-memory content changed in this batch;
    /// false when it is only being reprocessed on request.
    pub changed: bool,
}

impl ProcessContext<'_> {
    /// Absolute path of a tenant-relative suffix for the current tenant.
    pub fn tenant_path(&self, suffix: &str) -> String {
        self.layout.tenant_path(self.tenant, suffix)
    }
}

/// What one processor produced for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Derived documents; one at the source path is an in-place rewrite.
    pub documents: Vec<Configuration>,
    /// Already-known documents to run through the chain again this batch.
    pub reprocess: BTreeSet<String>,
    /// Derived documents owned by other tenants.
    pub external: Vec<Configuration>,
}

impl ProcessOutput {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn rewrite(doc: Configuration) -> Self {
        Self {
            documents: vec![doc],
            ..Self::default()
        }
    }
}

/// Errors raised inside a processor. They never leave the pipeline.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to render {path}: {message}")]
    Render { path: String, message: String },

    #[error("Script engine failed on {path}: {message}")]
    Engine { path: String, message: String },

    #[error("Processor panicked on {path}: {message}")]
    Panicked { path: String, message: String },
}

/// A content transformation in the chain.
pub trait Processor: Send + Sync + fmt::Debug {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    /// Cheap filter evaluated before `process`.
    fn supports(&self, doc: &Configuration) -> bool;

    /// Transform `doc`. Tombstones (blank content) are passed too so
    /// processors can drop dependency state; their documents are discarded.
    fn process(
        &self,
        doc: &Configuration,
        ctx: &ProcessContext<'_>,
    ) -> Result<ProcessOutput, ProcessorError>;
}
