//! Common types used throughout sharehub.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A directory path on the remote collection in canonical form.
///
/// Canonical paths always start and end with `/`, so `/a`, `a/` and `a`
/// all map to `/a/`. Access rules are matched against this form, which makes
/// a directory "shared" exactly when a rule with the same canonical path exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SharedPath(String);

impl SharedPath {
    /// Normalize a raw path into its canonical form.
    ///
    /// An empty input maps to the root `/`.
    pub fn new(path: &str) -> Self {
        let mut canonical = String::with_capacity(path.len() + 2);
        if !path.starts_with('/') {
            canonical.push('/');
        }
        canonical.push_str(path);
        if !canonical.ends_with('/') {
            canonical.push('/');
        }
        Self(canonical)
    }

    /// Create the root path.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Get the canonical string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a child entry name onto this directory.
    pub fn join(&self, child: &str) -> Self {
        Self::new(&format!("{}{}", self.0, child.trim_start_matches('/')))
    }

    /// Get the last non-empty component, if any.
    pub fn name(&self) -> Option<&str> {
        self.0.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl From<String> for SharedPath {
    fn from(path: String) -> Self {
        Self::new(&path)
    }
}

impl From<&str> for SharedPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<SharedPath> for String {
    fn from(path: SharedPath) -> Self {
        path.0
    }
}

impl AsRef<str> for SharedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SharedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shared_path_normalization() {
        assert_eq!(SharedPath::new("/a").as_str(), "/a/");
        assert_eq!(SharedPath::new("a/").as_str(), "/a/");
        assert_eq!(SharedPath::new("a").as_str(), "/a/");
        assert_eq!(SharedPath::new("/a/").as_str(), "/a/");
    }

    #[test]
    fn test_shared_path_root() {
        assert!(SharedPath::new("").is_root());
        assert!(SharedPath::new("/").is_root());
        assert_eq!(SharedPath::root().name(), None);
    }

    #[test]
    fn test_shared_path_nested() {
        let path = SharedPath::new("data/alice_1");
        assert_eq!(path.as_str(), "/data/alice_1/");
        assert_eq!(path.name(), Some("alice_1"));
    }

    #[test]
    fn test_shared_path_join() {
        let parent = SharedPath::new("/data");
        assert_eq!(parent.join("old").as_str(), "/data/old/");
        assert_eq!(SharedPath::root().join("x").as_str(), "/x/");
    }

    #[test]
    fn test_shared_path_serde_normalizes() {
        let path: SharedPath = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(path.as_str(), "/alice/");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"/alice/\"");
    }

    proptest! {
        #[test]
        fn prop_slash_variants_agree(name in "[a-zA-Z0-9_.-]{1,32}") {
            let canonical = SharedPath::new(&format!("/{}/", name));
            prop_assert_eq!(&SharedPath::new(&name), &canonical);
            prop_assert_eq!(&SharedPath::new(&format!("/{}", name)), &canonical);
            prop_assert_eq!(&SharedPath::new(&format!("{}/", name)), &canonical);
        }

        #[test]
        fn prop_normalization_is_idempotent(raw in "[a-z/]{0,24}") {
            let once = SharedPath::new(&raw);
            let twice = SharedPath::new(once.as_str());
            prop_assert!(once.as_str().starts_with('/'));
            prop_assert!(once.as_str().ends_with('/'));
            prop_assert_eq!(once, twice);
        }
    }
}
