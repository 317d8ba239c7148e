//! Configuration schema definitions.
//!
//! This module defines the complete settings structure for the service.
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::PathLayout;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Derivation store settings.
    pub store: StoreConfig,

    /// Processor chain settings.
    pub processors: ProcessorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Initial content for the in-memory backing store.
    pub seed: SeedConfig,
}

/// Derivation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum wait for the mutation lock, in seconds.
    pub lock_timeout_secs: u64,

    /// Folder holding one sub-folder per tenant.
    pub tenants_root: String,

    /// Alias tree document name, relative to `tenants_root`.
    pub alias_file: String,
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn layout(&self) -> PathLayout {
        PathLayout::new(self.tenants_root.clone(), self.alias_file.clone())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 30,
            tenants_root: "/config/tenants".to_string(),
            alias_file: "tenant-aliases.yml".to_string(),
        }
    }
}

/// Processor chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Resolve `$include` directives.
    pub include_enabled: bool,

    /// Substitute `${...}` placeholders.
    pub substitution_enabled: bool,

    /// Tenant profile document name, relative to the tenant folder.
    pub profile_file: String,

    /// Environment variables never exposed to substitution.
    pub env_blacklist: Vec<String>,

    /// Bound on variable-to-variable resolution passes.
    pub max_substitution_passes: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            include_enabled: true,
            substitution_enabled: true,
            profile_file: "tenant-profile.yml".to_string(),
            env_blacklist: [
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
                "AWS_SESSION_TOKEN",
                "GIT_PASSWORD",
                "GITHUB_TOKEN",
                "DATABASE_URL",
                "JWT_SECRET",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_substitution_passes: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Seed configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SeedConfig {
    /// Local directory mirrored into the backing store at startup. A file
    /// at `<directory>/a/b.yml` becomes the document `/a/b.yml`.
    pub directory: Option<PathBuf>,
}
