//! Tenant alias tree.
//!
//! # Data Flow
//! ```text
//! <tenants_root>/tenant-aliases.yml written
//!     → document.rs (parse + validate, reject cycles/duplicates)
//!     → TenantAliasTree (arena: key → parent, derived children index)
//!     → published inside the store snapshot with the tenant states
//!     → store inheritance walks parents/children
//! ```
//!
//! # Design Decisions
//! - Rebuilt wholesale from one document, never edited in place once published
//! - Validation happens before any tenant state is staged

pub mod document;
pub mod tree;

use thiserror::Error;

pub use document::parse_alias_tree;
pub use tree::TenantAliasTree;

/// Errors raised while building the alias tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AliasError {
    /// The edit would make a tenant its own ancestor, or lists a tenant twice.
    #[error("Wrong alias configuration: {0}")]
    WrongAliasConfiguration(String),

    /// The alias document is not valid YAML of the expected shape.
    #[error("Malformed alias document: {0}")]
    Malformed(String),
}
