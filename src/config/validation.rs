//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, passes > 0)
//! - Validate paths and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.store.lock_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "store.lock_timeout_secs",
            "must be greater than 0",
        ));
    }
    if !config.store.tenants_root.starts_with('/') {
        errors.push(ValidationError::new(
            "store.tenants_root",
            format!("must be absolute, got {:?}", config.store.tenants_root),
        ));
    }
    if config.store.alias_file.trim().is_empty() {
        errors.push(ValidationError::new("store.alias_file", "must not be empty"));
    }
    if config.processors.profile_file.trim().is_empty() {
        errors.push(ValidationError::new(
            "processors.profile_file",
            "must not be empty",
        ));
    }
    if config.processors.max_substitution_passes == 0 {
        errors.push(ValidationError::new(
            "processors.max_substitution_passes",
            "must be greater than 0",
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
