//! Versioned proxy cache.
//!
//! # Data Flow
//! ```text
//! read(stamp)
//!     → proxy.rs (known stamp? serve published snapshot)
//!     → otherwise refresh_all → backing.rs find_all → store pipeline
//!
//! write(doc) / delete(path)
//!     → store validation (alias tree)
//!     → mutation lock
//!     → backing.rs (hash precondition, new stamp)
//!     → store pipeline (changed paths)
//!     → announce.rs (stamp + changed paths, once)
//! ```
//!
//! # Design Decisions
//! - The backing store and the announcer are traits; git/S3 adapters and
//!   the message bus live outside this crate
//! - The cache never caches separately from the store; the store snapshot
//!   is the cached view

pub mod announce;
pub mod backing;
pub mod proxy;
pub mod types;

pub use announce::{BroadcastAnnouncer, ChangeAnnouncer, ChangeEvent, FanoutAnnouncer, TracingAnnouncer};
pub use backing::{BackingStore, InMemoryBackingStore};
pub use proxy::VersionedProxyCache;
pub use types::{BackingError, BackingResult, CacheError, CacheResult};
