//! Key derivation for the namespaced store layout.
//!
//! All state for one cache namespace lives under four disjoint key classes:
//!
//! - `<ns>:entry:<id>` — one entry's payload (with native TTL if set)
//! - `<ns>:entries`    — the ordered list of known entry identifiers
//! - `<ns>:tag:<tag>`  — the set of identifiers carrying a tag
//! - `<ns>:frozen`     — the frozen flag, absent means live

use crate::error::{CacheError, CacheResult};

/// Maximum length for namespaces, entry identifiers, and tags.
pub const MAX_NAME_LENGTH: usize = 250;

/// Derives storage keys for one cache namespace.
///
/// Identifiers and tags are validated before key derivation, so distinct
/// entries or tags within a namespace can never collide (neither `:` nor any
/// other separator character is allowed in a name), and distinct namespaces
/// never share keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Create a key space for a namespace.
    ///
    /// The namespace obeys the same naming constraint as identifiers and
    /// tags; a violation is a configuration error.
    pub fn new(namespace: impl Into<String>) -> CacheResult<Self> {
        let namespace = namespace.into();
        if !is_valid_name(&namespace) {
            return Err(CacheError::Config(format!(
                "invalid cache namespace: {namespace:?}"
            )));
        }
        Ok(Self { namespace })
    }

    /// The namespace this key space covers.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key holding one entry's payload.
    pub fn entry(&self, id: &str) -> String {
        format!("{}:entry:{}", self.namespace, id)
    }

    /// Key holding the list of known entry identifiers.
    pub fn entries(&self) -> String {
        format!("{}:entries", self.namespace)
    }

    /// Key holding the identifier set for one tag.
    pub fn tag(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.namespace, tag)
    }

    /// Key holding the frozen flag.
    pub fn frozen(&self) -> String {
        format!("{}:frozen", self.namespace)
    }

    /// Match pattern covering every tag set in the namespace.
    pub fn tag_pattern(&self) -> String {
        format!("{}:tag:*", self.namespace)
    }

    /// Match pattern covering every key in the namespace.
    pub fn all_pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }

    /// Recover the tag name from a tag-set key, if it is one of ours.
    pub fn tag_from_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(&self.namespace)
            .and_then(|rest| rest.strip_prefix(":tag:"))
    }
}

/// Validate an entry identifier.
///
/// Runs synchronously before any store call, so a bad name can never cause a
/// partial write.
pub fn validate_identifier(id: &str) -> CacheResult<()> {
    if is_valid_name(id) {
        Ok(())
    } else {
        Err(CacheError::InvalidIdentifier(id.to_string()))
    }
}

/// Validate a tag.
pub fn validate_tag(tag: &str) -> CacheResult<()> {
    if is_valid_name(tag) {
        Ok(())
    } else {
        Err(CacheError::InvalidTag(tag.to_string()))
    }
}

/// Names are non-empty, at most [`MAX_NAME_LENGTH`] bytes, and restricted to
/// ASCII alphanumerics plus `_`, `-`, and `%`. This keeps them safe for every
/// supported store (no separators, no whitespace, no glob characters).
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'%')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        let keys = KeySpace::new("Foo_Cache").unwrap();
        assert_eq!(keys.entry("entry_1"), "Foo_Cache:entry:entry_1");
        assert_eq!(keys.entries(), "Foo_Cache:entries");
        assert_eq!(keys.tag("some_tag"), "Foo_Cache:tag:some_tag");
        assert_eq!(keys.frozen(), "Foo_Cache:frozen");
    }

    #[test]
    fn test_patterns() {
        let keys = KeySpace::new("app").unwrap();
        assert_eq!(keys.tag_pattern(), "app:tag:*");
        assert_eq!(keys.all_pattern(), "app:*");
    }

    #[test]
    fn test_tag_from_key() {
        let keys = KeySpace::new("app").unwrap();
        assert_eq!(keys.tag_from_key("app:tag:users"), Some("users"));
        assert_eq!(keys.tag_from_key("app:entry:users"), None);
        assert_eq!(keys.tag_from_key("other:tag:users"), None);
    }

    #[test]
    fn test_key_classes_are_disjoint() {
        let keys = KeySpace::new("ns").unwrap();
        // "entries" and "frozen" are legal identifiers but live in the
        // "entry:" class, so they cannot shadow the list or the flag.
        assert_ne!(keys.entry("entries"), keys.entries());
        assert_ne!(keys.entry("frozen"), keys.frozen());
        assert_ne!(keys.tag("frozen"), keys.frozen());
    }

    #[test]
    fn test_namespaces_never_collide() {
        let a = KeySpace::new("a").unwrap();
        let b = KeySpace::new("b").unwrap();
        assert_ne!(a.entry("x"), b.entry("x"));
        assert_ne!(a.entries(), b.entries());
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("entry_1").is_ok());
        assert!(validate_identifier("A-b%2").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("has:colon").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_tag_validation() {
        assert!(validate_tag("users").is_ok());
        assert!(matches!(
            validate_tag("a*b"),
            Err(CacheError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_namespace_validation() {
        assert!(KeySpace::new("ok-ns").is_ok());
        assert!(matches!(
            KeySpace::new("bad ns"),
            Err(CacheError::Config(_))
        ));
    }
}
