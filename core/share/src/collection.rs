//! Handle on the remote collection: adapter plus credential broker.

use std::sync::Arc;

use sharehub_common::{Error, Result, SharedPath};
use sharehub_transfer::{AccessToken, CredentialBroker, DirEntry, ScopeFamily, TransferApi};

/// Remote collection as seen by the share components.
///
/// Cheap to clone; every component holds its own copy.
#[derive(Clone)]
pub struct Collection {
    transfer: Arc<dyn TransferApi>,
    broker: Arc<dyn CredentialBroker>,
}

impl Collection {
    pub fn new(transfer: Arc<dyn TransferApi>, broker: Arc<dyn CredentialBroker>) -> Self {
        Self { transfer, broker }
    }

    /// The transfer adapter.
    pub fn transfer(&self) -> &dyn TransferApi {
        self.transfer.as_ref()
    }

    /// Get a fresh token for `family`.
    pub async fn authorize(&self, family: ScopeFamily) -> Result<AccessToken> {
        self.broker.authorize(family).await
    }

    /// List a directory, mapping a missing directory to [`Error::NotFound`].
    ///
    /// Other remote failures pass through unchanged.
    pub async fn list_dir(&self, token: &AccessToken, path: &SharedPath) -> Result<Vec<DirEntry>> {
        match self.transfer.ls(token, path.as_str()).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => {
                Err(Error::NotFound(format!("Directory {} not found", path)))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharehub_common::RemoteError;
    use sharehub_transfer::{MemoryTransfer, Operation, StaticBroker};

    #[tokio::test]
    async fn test_list_dir_maps_not_found() {
        let memory = MemoryTransfer::new();
        let collection = Collection::new(Arc::new(memory), Arc::new(StaticBroker::new("t")));
        let token = collection.authorize(ScopeFamily::Transfer).await.unwrap();

        let err = collection
            .list_dir(&token, &SharedPath::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg == "Directory /missing/ not found"));
    }

    #[tokio::test]
    async fn test_list_dir_passes_other_errors() {
        let memory = MemoryTransfer::new();
        memory.inject_failure(Operation::Ls, "/", RemoteError::new(403, "PermissionDenied", "no"));
        let collection = Collection::new(Arc::new(memory), Arc::new(StaticBroker::new("t")));
        let token = collection.authorize(ScopeFamily::Transfer).await.unwrap();

        let err = collection.list_dir(&token, &SharedPath::root()).await.unwrap_err();
        assert!(matches!(err, Error::Remote(remote) if remote.status == 403));
    }
}
