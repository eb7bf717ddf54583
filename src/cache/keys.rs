//! Namespaced cache keys.
//!
//! Every key stored by a [`NamespacedCache`](super::NamespacedCache) is
//! prefixed with `"<namespace>."` so unrelated users of a shared medium never
//! collide.

use std::fmt;

const SEPARATOR: char = '.';

/// Logical owner of a set of cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim_end_matches(SEPARATOR);
        Self {
            prefix: format!("{name}{SEPARATOR}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.prefix[..self.prefix.len() - SEPARATOR.len_utf8()]
    }

    /// True when `key` already carries this namespace's prefix.
    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Qualify `key`; already-qualified keys are returned unchanged.
    pub fn qualify(&self, key: &str) -> QualifiedKey {
        if self.owns(key) {
            QualifiedKey(key.to_string())
        } else {
            QualifiedKey(format!("{}{key}", self.prefix))
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A key that has been prefixed with its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedKey(String);

impl QualifiedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for QualifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_plain_keys() {
        let ns = Namespace::new("Contextualizer.ContextualMenu");
        assert_eq!(
            ns.qualify("Commands").as_str(),
            "Contextualizer.ContextualMenu.Commands"
        );
    }

    #[test]
    fn qualification_is_idempotent() {
        let ns = Namespace::new("menu");
        let once = ns.qualify("Commands");
        let twice = ns.qualify(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn trailing_separator_is_normalized() {
        let ns = Namespace::new("menu.");
        assert_eq!(ns.name(), "menu");
        assert_eq!(ns.qualify("k").as_str(), "menu.k");
    }

    #[test]
    fn other_namespaces_do_not_own_keys() {
        let menu = Namespace::new("menu");
        let ribbon = Namespace::new("ribbon");
        let key = menu.qualify("Commands");
        assert!(menu.owns(key.as_str()));
        assert!(!ribbon.owns(key.as_str()));
        assert_eq!(
            ribbon.qualify(key.as_str()).as_str(),
            "ribbon.menu.Commands"
        );
    }
}
