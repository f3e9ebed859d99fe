//! Age-based retention sweeping.

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use sharehub_common::{Error, Result, SharedPath};
use sharehub_transfer::ScopeFamily;

use crate::collection::Collection;
use crate::config::ShareConfig;
use crate::reconciler::Reconciler;

/// Deletes directory entries older than a threshold.
#[derive(Clone)]
pub struct RetentionSweeper {
    collection: Collection,
    reconciler: Reconciler,
    floor_days: i64,
}

/// Whole days between a modification date and `today`.
pub fn age_in_days(modified: NaiveDate, today: NaiveDate) -> i64 {
    (today - modified).num_days()
}

impl RetentionSweeper {
    pub fn new(collection: Collection, config: &ShareConfig) -> Self {
        Self {
            reconciler: Reconciler::new(collection.clone()),
            collection,
            floor_days: config.retention_floor_days(),
        }
    }

    /// Unshare and delete every entry of `path` at least `min_days` old.
    ///
    /// Age is measured against the local calendar date.
    pub async fn delete_older_than(&self, path: &str, min_days: i64) -> Result<Vec<String>> {
        self.delete_older_than_on(path, min_days, Local::now().date_naive())
            .await
    }

    /// [`RetentionSweeper::delete_older_than`] with an explicit `today`.
    ///
    /// # Preconditions
    /// - `min_days` is at least the configured floor; checked before any
    ///   remote call
    ///
    /// # Postconditions
    /// - Rules on each old entry are removed and a recursive delete task is
    ///   submitted for it; tasks are not awaited
    ///
    /// # Returns
    /// Submitted paths, whatever the tasks' eventual outcome.
    ///
    /// # Errors
    /// - [`Error::PolicyViolation`] below the floor
    /// - [`Error::NotFound`] when `path` does not exist
    /// - Remote errors while unsharing or submitting abort the sweep
    pub async fn delete_older_than_on(
        &self,
        path: &str,
        min_days: i64,
        today: NaiveDate,
    ) -> Result<Vec<String>> {
        if min_days < self.floor_days {
            return Err(Error::PolicyViolation(format!(
                "Not allowed to delete dirs that are less than {} days old",
                self.floor_days
            )));
        }

        let token = self.collection.authorize(ScopeFamily::Transfer).await?;
        let parent = SharedPath::new(path);
        let entries = self.collection.list_dir(&token, &parent).await?;
        let transfer = self.collection.transfer();
        let mut submitted = Vec::new();

        for entry in entries {
            let modified = match entry.modified_date() {
                Ok(date) => date,
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Skipping entry without a usable date");
                    continue;
                }
            };

            if age_in_days(modified, today) < min_days {
                continue;
            }

            let target = format!("{}{}", parent, entry.name);
            self.reconciler
                .unshare_with(&token, &SharedPath::new(&target))
                .await?;

            let task_id = transfer.submit_delete(&token, &target, true).await?;
            info!(path = %target, task_id = %task_id, "Submitted delete");
            submitted.push(target);
        }

        Ok(submitted)
    }
}
