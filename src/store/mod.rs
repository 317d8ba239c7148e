//! In-memory derivation store.
//!
//! # Data Flow
//! ```text
//! ConfigStore::save_documents(docs)
//!     → lock.rs (bounded wait on the mutation lock)
//!     → alias document parsed and validated first (rejects before staging)
//!     → batch.rs (stage touched tenants from the published snapshot)
//!     → state.rs (apply updates to persisted + in_memory, tombstones)
//!     → inheritance.rs (propagate down the alias tree, rechain on tree edits)
//!     → pipeline.rs (processor chain until no more reprocess requests)
//!     → snapshot.rs (one swap publishes every touched tenant + the tree)
//!     → changed paths returned to the caller
//! ```
//!
//! # Design Decisions
//! - Copy-on-publish: readers load an `Arc<StoreSnapshot>` and never block
//! - A failed batch publishes nothing; publication is the last step
//! - Processor failures are contained inside the pipeline

pub mod batch;
pub mod inheritance;
pub mod lock;
pub mod mutator;
pub mod pipeline;
pub mod snapshot;
pub mod state;
pub mod types;

pub use lock::{MutationGuard, MutationLock};
pub use mutator::ConfigStore;
pub use snapshot::StoreSnapshot;
pub use state::{ConfigState, IntermediateConfigState};
pub use types::{StoreError, StoreResult};
