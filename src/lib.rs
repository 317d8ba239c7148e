//! Multi-tenant configuration distribution library.

pub mod alias;
pub mod cache;
pub mod config;
pub mod model;
pub mod observability;
pub mod processors;
pub mod store;

pub use cache::VersionedProxyCache;
pub use config::ServiceConfig;
pub use model::{Configuration, PathLayout, VersionStamp};
pub use store::ConfigStore;
