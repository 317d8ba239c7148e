//! Version stamps issued by the backing store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifying a point-in-time state of the backing store
/// (a commit id for git, a sequence for the in-memory store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionStamp(String);

impl VersionStamp {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionStamp {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VersionStamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}
