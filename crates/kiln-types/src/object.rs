use std::fmt;

use serde::{Deserialize, Serialize};

/// Store key of any persisted object.
///
/// Logical objects (component versions, symlinks) are addressed by a
/// stable path-like id such as `acme/ui/button@0.0.1`. Source blobs are
/// addressed by the hex digest of their contents. The store treats both
/// forms as opaque strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is empty (never a valid store key).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the id starts with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Short representation for log output (at most 12 characters).
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }

    /// Consume the id and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_inner_string() {
        let id = ObjectId::new("acme/button@0.0.1");
        assert_eq!(id.to_string(), "acme/button@0.0.1");
        assert_eq!(id.as_str(), "acme/button@0.0.1");
    }

    #[test]
    fn short_truncates_long_ids() {
        let id = ObjectId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        let id = ObjectId::new("tiny");
        assert_eq!(id.short(), "tiny");
    }

    #[test]
    fn prefix_matching() {
        let id = ObjectId::new("acme/button@1.0.0");
        assert!(id.starts_with("acme/button@"));
        assert!(!id.starts_with("acme/buttons@"));
    }

    #[test]
    fn serde_is_transparent() {
        let id = ObjectId::new("acme/button");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"acme/button\"");
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = ObjectId::new("a/x@0.0.1");
        let b = ObjectId::new("b/x@0.0.1");
        assert!(a < b);
    }
}
