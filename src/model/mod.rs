//! Core value types shared by every subsystem.
//!
//! # Data Flow
//! ```text
//! backing store / write request
//!     → Configuration (path + content, immutable)
//!     → PathLayout::tenant_of (route to owning tenant or commons)
//!     → store pipeline
//!     → VersionStamp advanced by the proxy cache
//! ```
//!
//! # Design Decisions
//! - Documents are whole-file blobs; blank content is a tombstone
//! - Paths are absolute and slash separated
//! - Tenant routing is a pure function of the path and the layout

pub mod configuration;
pub mod layout;
pub mod stamp;

pub use configuration::{content_hash, Configuration};
pub use layout::{PathLayout, COMMONS_TENANT};
pub use stamp::VersionStamp;
