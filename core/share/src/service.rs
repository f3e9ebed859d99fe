//! Share service facade used by the HTTP layer.

use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use sharehub_common::{Error, RemoteError, Result, SharedPath};
use sharehub_transfer::{
    AccessRule, AccessToken, ByteStream, CredentialBroker, DirEntry, ScopeFamily, TaskId,
    TaskStatus, TransferApi,
};

use crate::collection::Collection;
use crate::config::ShareConfig;
use crate::provisioner::Provisioner;
use crate::reconciler::Reconciler;
use crate::retention::RetentionSweeper;

/// Entry point for every share operation.
///
/// Holds the immutable configuration and the injected collaborators; it is
/// cheap to clone and safe to share across requests.
#[derive(Clone)]
pub struct ShareService {
    collection: Collection,
    config: Arc<ShareConfig>,
    provisioner: Provisioner,
    reconciler: Reconciler,
    sweeper: RetentionSweeper,
}

impl ShareService {
    /// Create a new service.
    pub fn new(
        transfer: Arc<dyn TransferApi>,
        broker: Arc<dyn CredentialBroker>,
        config: ShareConfig,
    ) -> Self {
        let collection = Collection::new(transfer, broker);

        Self {
            provisioner: Provisioner::new(collection.clone()),
            reconciler: Reconciler::new(collection.clone()),
            sweeper: RetentionSweeper::new(collection.clone(), &config),
            collection,
            config: Arc::new(config),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ShareConfig {
        &self.config
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    /// See [`Provisioner::create`].
    pub async fn create_shared_dir(&self, identity: &str, name: Option<&str>) -> Result<SharedPath> {
        self.provisioner.create(identity, name).await
    }

    /// List a remote directory.
    pub async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        self.collection.list_dir(&token, &SharedPath::new(path)).await
    }

    /// See [`Reconciler::list`].
    pub async fn shared_dirs(&self) -> Result<Vec<AccessRule>> {
        self.reconciler.list().await
    }

    /// See [`Reconciler::unshare`].
    pub async fn unshare_dir(&self, path: &str) -> Result<()> {
        self.reconciler.unshare(path).await
    }

    /// See [`Reconciler::delete_zombies`].
    pub async fn delete_zombie_shares(&self) -> Result<Vec<String>> {
        self.reconciler.delete_zombies().await
    }

    /// See [`RetentionSweeper::delete_older_than`].
    pub async fn delete_old_dirs(&self, path: &str, min_days: i64) -> Result<Vec<String>> {
        self.sweeper.delete_older_than(path, min_days).await
    }

    /// Delete one directory and wait for the remote task to finish.
    ///
    /// # Postconditions
    /// - No rule references the path and the delete task has succeeded
    ///
    /// # Errors
    /// - [`Error::NotFound`] when the directory does not exist; nothing is submitted
    /// - [`Error::Timeout`] when the task outlives the configured wait
    /// - [`Error::Remote`] when the task fails or a remote call is rejected
    pub async fn delete_dir(&self, path: &str) -> Result<()> {
        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        let path = SharedPath::new(path);

        self.collection.list_dir(&token, &path).await?;
        self.reconciler.unshare_with(&token, &path).await?;

        let task_id = self
            .collection
            .transfer()
            .submit_delete(&token, path.as_str(), true)
            .await?;
        info!(path = %path, task_id = %task_id, "Submitted delete");

        self.wait_for_task(&token, &task_id).await?;
        info!(path = %path, task_id = %task_id, "Successfully deleted dir");
        Ok(())
    }

    /// Stream a file from the collection with a data-access token.
    pub async fn fetch_file(&self, path: &str) -> Result<ByteStream> {
        let token = self.collection.authorize(ScopeFamily::CollectionData).await?;
        self.collection.transfer().fetch_file(&token, path).await
    }

    async fn wait_for_task(&self, token: &AccessToken, task_id: &TaskId) -> Result<()> {
        let limit = self.config.task_wait_timeout;

        timeout(limit, self.poll_task(token, task_id))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "Delete task {} did not finish within {}s",
                    task_id,
                    limit.as_secs_f32()
                ))
            })?
    }

    async fn poll_task(&self, token: &AccessToken, task_id: &TaskId) -> Result<()> {
        loop {
            let status = self
                .collection
                .transfer()
                .task_status(token, task_id)
                .await?;

            match status {
                TaskStatus::Succeeded => return Ok(()),
                TaskStatus::Failed => {
                    return Err(Error::Remote(RemoteError::new(
                        500,
                        "TaskFailed",
                        format!("Delete task {} failed", task_id),
                    )));
                }
                TaskStatus::Active | TaskStatus::Inactive => {
                    debug!(task_id = %task_id, ?status, "Waiting for task");
                    sleep(self.config.task_poll_interval).await;
                }
            }
        }
    }
}
