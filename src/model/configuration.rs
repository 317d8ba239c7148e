//! The configuration document value object.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A configuration document addressed by an absolute, slash-separated path.
///
/// Equality is by value. A document whose content is blank (empty or only
/// whitespace) is a tombstone: writing it removes the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    path: String,
    content: String,
}

impl Configuration {
    /// Create a new document.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Create a tombstone for `path`.
    pub fn tombstone(path: impl Into<String>) -> Self {
        Self::new(path, String::new())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// True when the content is blank, i.e. this document deletes its path.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Same content addressed at another path.
    pub fn relocated(&self, path: impl Into<String>) -> Self {
        Self::new(path, self.content.clone())
    }

    /// Lowercase hex SHA-256 of the content.
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }

    /// File extension of the last path segment, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.path.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            None
        } else {
            Some(ext)
        }
    }
}

/// Hash used for optimistic concurrency checks against the backing store.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_content_is_tombstone() {
        assert!(Configuration::tombstone("/a.yml").is_blank());
        assert!(Configuration::new("/a.yml", "  \n\t").is_blank());
        assert!(!Configuration::new("/a.yml", "key: value").is_blank());
    }

    #[test]
    fn test_extension() {
        assert_eq!(Configuration::new("/x/a.yml", "").extension(), Some("yml"));
        assert_eq!(Configuration::new("/x/a.b.json", "").extension(), Some("json"));
        assert_eq!(Configuration::new("/x/.hidden", "").extension(), None);
        assert_eq!(Configuration::new("/x/Makefile", "").extension(), None);
    }

    #[test]
    fn test_content_hash_is_stable_sha256() {
        let doc = Configuration::new("/a", "abc");
        assert_eq!(
            doc.content_hash(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(doc.content_hash(), content_hash("abc"));
    }

    #[test]
    fn test_value_equality() {
        let a = Configuration::new("/a", "x");
        assert_eq!(a, Configuration::new("/a", "x"));
        assert_ne!(a, Configuration::new("/a", "y"));
        assert_eq!(a.relocated("/b").path(), "/b");
    }
}
