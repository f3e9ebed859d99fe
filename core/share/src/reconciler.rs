//! Access rule reconciliation.
//!
//! Listing and mutation are separate remote calls; rules may change between
//! the two. Cleanup here is best-effort and never assumes a transaction.

use tracing::{error, info, warn};

use sharehub_common::{Result, SharedPath};
use sharehub_transfer::{AccessRule, AccessToken, ScopeFamily};

use crate::collection::Collection;

/// Lists, removes and garbage-collects access rules.
#[derive(Clone)]
pub struct Reconciler {
    collection: Collection,
}

impl Reconciler {
    pub fn new(collection: Collection) -> Self {
        Self { collection }
    }

    /// Every access rule on the collection.
    pub async fn list(&self) -> Result<Vec<AccessRule>> {
        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        self.collection.transfer().acl_list(&token).await
    }

    /// Remove every rule whose path matches `path` after normalization.
    ///
    /// No matching rule is not an error.
    pub async fn unshare(&self, path: &str) -> Result<()> {
        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        self.unshare_with(&token, &SharedPath::new(path)).await?;
        Ok(())
    }

    /// [`Reconciler::unshare`] with a token the caller already holds.
    ///
    /// # Returns
    /// Number of rules removed.
    pub async fn unshare_with(&self, token: &AccessToken, path: &SharedPath) -> Result<usize> {
        let transfer = self.collection.transfer();
        let rules = transfer.acl_list(token).await?;
        let mut removed = 0;

        for rule in rules.iter().filter(|rule| &rule.shared_path() == path) {
            transfer.acl_delete(token, &rule.id).await?;
            info!(path = %path, rule_id = %rule.id, "Unshared dir");
            removed += 1;
        }

        Ok(removed)
    }

    /// Remove rules whose directory no longer exists.
    ///
    /// A rule is a zombie when listing its path reports not-found. Any other
    /// failure, while listing or while removing, skips that rule and the sweep
    /// continues.
    ///
    /// # Returns
    /// Paths of the removed rules.
    pub async fn delete_zombies(&self) -> Result<Vec<String>> {
        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        let transfer = self.collection.transfer();
        let rules = transfer.acl_list(&token).await?;
        let mut reclaimed = Vec::new();

        for rule in rules {
            let path = rule.shared_path();
            match self.collection.list_dir(&token, &path).await {
                Ok(_) => continue,
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping share, listing failed");
                    continue;
                }
            }

            match transfer.acl_delete(&token, &rule.id).await {
                Ok(()) => {
                    info!(path = %rule.path, rule_id = %rule.id, "Removed zombie share");
                    reclaimed.push(rule.path);
                }
                Err(e) => {
                    error!(path = %rule.path, error = %e, "Failed to remove zombie share");
                }
            }
        }

        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_common::{Error, RemoteError};
    use sharehub_transfer::{MemoryTransfer, Operation, StaticBroker};
    use std::sync::Arc;

    const STAMP: &str = "2024-05-01 10:00:00+00:00";

    fn setup() -> (MemoryTransfer, Reconciler) {
        let memory = MemoryTransfer::new();
        let collection = Collection::new(Arc::new(memory.clone()), Arc::new(StaticBroker::new("t")));
        (memory, Reconciler::new(collection))
    }

    #[tokio::test]
    async fn test_list_returns_all_rules() {
        let (memory, reconciler) = setup();
        memory.add_rule("p1", "/a/");
        memory.add_rule("p2", "/b/");

        let rules = reconciler.list().await.unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn test_list_failure_passes_through() {
        let (memory, reconciler) = setup();
        memory.inject_failure(Operation::AclList, "", RemoteError::new(500, "Boom", "down"));

        let err = reconciler.list().await.unwrap_err();
        assert!(matches!(err, Error::Remote(remote) if remote.status == 500));
    }

    #[tokio::test]
    async fn test_unshare_removes_every_match() {
        let (memory, reconciler) = setup();
        memory.add_rule("p1", "/shared/");
        memory.add_rule("p2", "/shared");
        memory.add_rule("p3", "/other/");

        reconciler.unshare("shared").await.unwrap();

        let rules = reconciler.list().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].path, "/other/");
    }

    #[tokio::test]
    async fn test_unshare_without_match_is_noop() {
        let (memory, reconciler) = setup();
        memory.add_rule("p1", "/a/");

        reconciler.unshare("/b").await.unwrap();
        assert_eq!(memory.rules().len(), 1);
    }

    #[tokio::test]
    async fn test_unshare_clears_path_for_any_rule_set() {
        let paths = ["/x/", "x", "/x", "/y/", "x/", "/x/y/"];
        for take in 0..=paths.len() {
            let (memory, reconciler) = setup();
            for (i, path) in paths.iter().take(take).enumerate() {
                memory.add_rule(&format!("p{}", i), path);
            }

            reconciler.unshare("/x/").await.unwrap();

            let remaining = reconciler.list().await.unwrap();
            assert!(remaining.iter().all(|r| r.shared_path().as_str() != "/x/"));
        }
    }

    #[tokio::test]
    async fn test_delete_zombies() {
        let (memory, reconciler) = setup();
        memory.add_dir("/live/", STAMP);
        memory.add_rule("p1", "/live/");
        memory.add_rule("p2", "/gone/");
        memory.add_rule("p3", "/also-gone");

        let mut reclaimed = reconciler.delete_zombies().await.unwrap();
        reclaimed.sort();
        assert_eq!(reclaimed, vec!["/also-gone", "/gone/"]);

        let rules = memory.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].path, "/live/");
    }

    #[tokio::test]
    async fn test_delete_zombies_skips_failures() {
        let (memory, reconciler) = setup();
        memory.add_rule("p1", "/flaky/");
        let stuck = memory.add_rule("p2", "/stuck/");
        memory.add_rule("p3", "/gone/");
        memory.inject_failure(Operation::Ls, "/flaky/", RemoteError::new(503, "Busy", "try later"));
        memory.inject_failure(Operation::AclDelete, &stuck, RemoteError::new(500, "Boom", "no"));

        let reclaimed = reconciler.delete_zombies().await.unwrap();
        assert_eq!(reclaimed, vec!["/gone/"]);

        let mut remaining: Vec<String> = memory.rules().into_iter().map(|r| r.path).collect();
        remaining.sort();
        assert_eq!(remaining, vec!["/flaky/", "/stuck/"]);
    }

    #[tokio::test]
    async fn test_delete_zombies_after_directory_removed() {
        let (memory, reconciler) = setup();
        memory.add_dir("/a/", STAMP);
        memory.add_rule("p1", "/a/");

        assert!(reconciler.delete_zombies().await.unwrap().is_empty());

        memory.remove_dir("/a/");
        assert_eq!(reconciler.delete_zombies().await.unwrap(), vec!["/a/"]);
    }
}
