//! Per-identity directory provisioning.

use tracing::{info, warn};
use uuid::Uuid;

use sharehub_common::{Error, Result, SharedPath};
use sharehub_transfer::{Identity, NewAccessRule, ScopeFamily};

use crate::collection::Collection;

/// Creates shared directories and grants them to their owner.
#[derive(Clone)]
pub struct Provisioner {
    collection: Collection,
}

/// Directory name prefix for an identity: the text before the first `@`.
pub fn name_prefix(identity: &str) -> &str {
    identity.split('@').next().unwrap_or(identity)
}

/// Generate a fresh directory path for an identity.
///
/// The random suffix makes collisions practically impossible, so no
/// existence check is made before mkdir.
pub fn generated_path(identity: &str) -> SharedPath {
    SharedPath::new(&format!("{}_{}", name_prefix(identity), Uuid::new_v4()))
}

impl Provisioner {
    pub fn new(collection: Collection) -> Self {
        Self { collection }
    }

    /// Resolve a username to its principal.
    ///
    /// # Errors
    /// - [`Error::NotFound`] naming the identity when nothing matches
    pub async fn resolve(&self, identity: &str) -> Result<Identity> {
        let token = self.collection.authorize(ScopeFamily::Identities).await?;
        let mut matches = self
            .collection
            .transfer()
            .get_identities(&token, identity)
            .await?;

        if matches.len() > 1 {
            warn!(identity, count = matches.len(), "Identity lookup is ambiguous, using first match");
        }

        if matches.is_empty() {
            return Err(Error::NotFound(format!(
                "{} is not registered with the identity provider",
                identity
            )));
        }
        Ok(matches.swap_remove(0))
    }

    /// Create a directory for `identity` and grant it read-write access.
    ///
    /// # Preconditions
    /// - `identity` is a username known to the identity provider
    ///
    /// # Postconditions
    /// - The directory exists remotely and one `rw` rule grants it to the identity
    /// - Returns the canonical path
    ///
    /// # Errors
    /// - [`Error::NotFound`] for an unknown identity
    /// - [`Error::Conflict`] carrying the path when the directory already exists
    /// - [`Error::Remote`] for any other remote failure; a failed grant leaves
    ///   the new directory in place
    pub async fn create(&self, identity: &str, name: Option<&str>) -> Result<SharedPath> {
        let principal = self.resolve(identity).await?;

        let path = match name {
            Some(name) => SharedPath::new(name),
            None => generated_path(identity),
        };

        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        let transfer = self.collection.transfer();

        match transfer.mkdir(&token, path.as_str()).await {
            Ok(()) => {}
            Err(Error::Remote(e)) if e.is_already_exists() => {
                return Err(Error::Conflict(format!("Dir already exists: {}", path)));
            }
            Err(e) => return Err(e),
        }

        transfer
            .acl_add(&token, &NewAccessRule::read_write(principal.id, &path))
            .await?;

        info!(path = %path, identity, "Created dir and shared it");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_common::RemoteError;
    use sharehub_transfer::{MemoryTransfer, Operation, StaticBroker};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn setup() -> (MemoryTransfer, Provisioner) {
        let memory = MemoryTransfer::new();
        memory.add_identity("alice@example.org", "p-alice");
        memory.add_identity("bob", "p-bob");
        let collection = Collection::new(Arc::new(memory.clone()), Arc::new(StaticBroker::new("t")));
        (memory, Provisioner::new(collection))
    }

    fn suffix_of<'a>(path: &'a SharedPath, prefix: &str) -> &'a str {
        path.as_str()
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix('/'))
            .unwrap()
    }

    #[test]
    fn test_name_prefix() {
        assert_eq!(name_prefix("alice@example.org"), "alice");
        assert_eq!(name_prefix("bob"), "bob");
        assert_eq!(name_prefix("a@b@c"), "a");
    }

    #[tokio::test]
    async fn test_create_generated_name() {
        let (memory, provisioner) = setup();

        let path = provisioner.create("alice@example.org", None).await.unwrap();

        let suffix = suffix_of(&path, "/alice_");
        assert!(Uuid::parse_str(suffix).is_ok());
        assert!(memory.dir_exists(path.as_str()));

        let rules = memory.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].path, path.as_str());
        assert_eq!(rules[0].principal, "p-alice");
        assert_eq!(rules[0].permissions, "rw");
    }

    #[tokio::test]
    async fn test_generated_suffixes_are_unique() {
        let (_memory, provisioner) = setup();
        let mut suffixes = HashSet::new();

        for _ in 0..50 {
            let path = provisioner.create("bob", None).await.unwrap();
            assert!(suffixes.insert(suffix_of(&path, "/bob_").to_string()));
        }
    }

    #[tokio::test]
    async fn test_create_explicit_name_is_normalized() {
        let (memory, provisioner) = setup();

        let path = provisioner.create("bob", Some("project-x")).await.unwrap();
        assert_eq!(path.as_str(), "/project-x/");
        assert_eq!(memory.rules()[0].path, "/project-x/");
    }

    #[tokio::test]
    async fn test_create_existing_is_conflict() {
        let (memory, provisioner) = setup();
        memory.add_dir("/taken/", "2024-01-01 00:00:00+00:00");

        let err = provisioner.create("bob", Some("/taken")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(msg) if msg == "Dir already exists: /taken/"));
        assert!(memory.rules().is_empty());
    }

    #[tokio::test]
    async fn test_create_unknown_identity() {
        let (memory, provisioner) = setup();

        let err = provisioner.create("mallory@example.org", None).await.unwrap_err();
        match err {
            Error::NotFound(msg) => assert!(msg.contains("mallory@example.org")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(memory.rules().is_empty());
    }

    #[tokio::test]
    async fn test_mkdir_failure_passes_through() {
        let (memory, provisioner) = setup();
        memory.inject_failure(
            Operation::Mkdir,
            "/denied/",
            RemoteError::new(403, "PermissionDenied", "not allowed"),
        );

        let err = provisioner.create("bob", Some("denied")).await.unwrap_err();
        assert!(matches!(err, Error::Remote(remote) if remote.status == 403));
    }

    #[tokio::test]
    async fn test_grant_failure_leaves_directory() {
        let (memory, provisioner) = setup();
        memory.inject_failure(
            Operation::AclAdd,
            "/orphan/",
            RemoteError::new(409, "Exists", "rule exists"),
        );

        let err = provisioner.create("bob", Some("orphan")).await.unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert!(memory.dir_exists("/orphan/"));
        assert!(memory.rules().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_identity_uses_first() {
        let (memory, provisioner) = setup();
        memory.add_identity("bob", "p-bob-2");

        let identity = provisioner.resolve("bob").await.unwrap();
        assert_eq!(identity.id, "p-bob");
    }
}
