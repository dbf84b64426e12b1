// Resource identifiers.
// Opaque string keys addressing both the remote resource and its cache entry.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque identifier, usually a URL.
///
/// No parsing or normalization is done: `http://x/a` and `http://x/a/` are
/// different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert an optional raw identifier, treating `None` and `""` alike.
    pub fn from_optional(value: Option<&str>) -> Option<Self> {
        value.filter(|v| !v.is_empty()).map(Self::new)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_normalization() {
        let a = Identifier::from("http://x/posts");
        let b = Identifier::from("http://x/posts/");
        let c = Identifier::from("HTTP://x/posts");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_optional() {
        assert_eq!(Identifier::from_optional(None), None);
        assert_eq!(Identifier::from_optional(Some("")), None);
        assert_eq!(
            Identifier::from_optional(Some("http://x")),
            Some(Identifier::from("http://x"))
        );
    }
}
