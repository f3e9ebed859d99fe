//! Transfer API trait definition and the records it exchanges.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use futures::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::pin::Pin;

use sharehub_common::{Error, Result, SharedPath};

use crate::auth::AccessToken;

/// Byte stream type for proxied file downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An identity resolved by the remote identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Principal identifier used in access rules.
    pub id: String,
    /// Username the identity was looked up by.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
}

/// An access rule on the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Rule identifier assigned by the remote service.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Kind of principal, usually `identity`.
    #[serde(default)]
    pub principal_type: String,
    /// Principal the rule grants access to.
    #[serde(default)]
    pub principal: String,
    /// Path the rule applies to, as stored remotely.
    pub path: String,
    /// Permission string, e.g. `r` or `rw`.
    #[serde(default)]
    pub permissions: String,
    /// Remaining remote fields (`role_id`, `expiration_date`, ...), passed through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AccessRule {
    /// The rule's path in canonical form.
    pub fn shared_path(&self) -> SharedPath {
        SharedPath::new(&self.path)
    }
}

/// Request to create an access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccessRule {
    /// Kind of principal.
    pub principal_type: String,
    /// Principal to grant access to.
    pub principal: String,
    /// Canonical path to grant.
    pub path: String,
    /// Permission string.
    pub permissions: String,
}

impl NewAccessRule {
    /// Read-write grant for a single identity.
    pub fn read_write(principal: impl Into<String>, path: &SharedPath) -> Self {
        Self {
            principal_type: "identity".to_string(),
            principal: principal.into(),
            path: path.as_str().to_string(),
            permissions: "rw".to_string(),
        }
    }
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Dir,
    File,
    Link,
    #[serde(other)]
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name, relative to the listed directory.
    pub name: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Remote modification timestamp, e.g. `2024-03-01 09:15:00+00:00`.
    #[serde(default)]
    pub last_modified: String,
    /// Unix permission bits as reported remotely.
    #[serde(default)]
    pub permissions: Option<String>,
    /// Remaining remote fields (`user`, `group`, `link_target`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DirEntry {
    /// Calendar date of the last modification, ignoring time of day.
    ///
    /// # Errors
    /// - Timestamp is missing or not in `YYYY-MM-DD ...` form
    pub fn modified_date(&self) -> Result<NaiveDate> {
        let date = self.last_modified.split_whitespace().next().ok_or_else(|| {
            Error::Serialization(format!("Entry {} has no modification time", self.name))
        })?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            Error::Serialization(format!(
                "Invalid modification time '{}' for {}: {}",
                self.last_modified, self.name, e
            ))
        })
    }
}

/// Handle of an asynchronous remote task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Active,
    Inactive,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Whether the task has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Transfer service operations used by the share layer.
///
/// All remote failures are reported as [`Error::Remote`] carrying the remote
/// status, code and message; transport failures as [`Error::Network`].
/// Implementations never retry.
#[async_trait]
pub trait TransferApi: Send + Sync {
    /// Get the adapter name (e.g., "globus", "memory").
    fn name(&self) -> &str;

    /// Look up identities registered under a username.
    ///
    /// # Returns
    /// Every match; an empty vector when the username is unknown.
    async fn get_identities(&self, token: &AccessToken, username: &str) -> Result<Vec<Identity>>;

    /// Create a directory on the collection.
    ///
    /// # Errors
    /// - Remote `ExternalError.MkdirFailed.Exists` when the path exists
    async fn mkdir(&self, token: &AccessToken, path: &str) -> Result<()>;

    /// List a directory on the collection.
    ///
    /// # Errors
    /// - Remote 404 when the directory does not exist
    async fn ls(&self, token: &AccessToken, path: &str) -> Result<Vec<DirEntry>>;

    /// Enumerate every access rule on the collection.
    async fn acl_list(&self, token: &AccessToken) -> Result<Vec<AccessRule>>;

    /// Add an access rule, returning its identifier.
    async fn acl_add(&self, token: &AccessToken, rule: &NewAccessRule) -> Result<String>;

    /// Delete an access rule by identifier.
    async fn acl_delete(&self, token: &AccessToken, rule_id: &str) -> Result<()>;

    /// Submit an asynchronous delete task for a path.
    async fn submit_delete(&self, token: &AccessToken, path: &str, recursive: bool)
        -> Result<TaskId>;

    /// Get the current state of a task.
    async fn task_status(&self, token: &AccessToken, task_id: &TaskId) -> Result<TaskStatus>;

    /// Stream a file from the collection's HTTPS server.
    ///
    /// `token` must carry the collection data-access scope.
    async fn fetch_file(&self, token: &AccessToken, path: &str) -> Result<ByteStream>;
}

/// Accept rule identifiers encoded either as strings or as integers.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rule_decoding() {
        let json = serde_json::json!({
            "DATA_TYPE": "access",
            "id": 4211,
            "principal_type": "identity",
            "principal": "a1b2",
            "path": "/alice_1",
            "permissions": "rw",
            "role_id": null
        });

        let rule: AccessRule = serde_json::from_value(json).unwrap();
        assert_eq!(rule.id, "4211");
        assert_eq!(rule.shared_path().as_str(), "/alice_1/");
    }

    #[test]
    fn test_unmodelled_fields_pass_through() {
        let rule: AccessRule = serde_json::from_value(serde_json::json!({
            "id": "r-1",
            "principal": "a1b2",
            "path": "/alice_1/",
            "permissions": "rw",
            "role_id": null,
            "expiration_date": "2030-01-01"
        }))
        .unwrap();
        let out = serde_json::to_value(&rule).unwrap();
        assert_eq!(out["expiration_date"], "2030-01-01");
        assert!(out["role_id"].is_null());
        assert!(out.as_object().unwrap().contains_key("role_id"));

        let entry: DirEntry = serde_json::from_value(serde_json::json!({
            "name": "link",
            "type": "file",
            "last_modified": "2024-03-01 23:59:59+00:00",
            "user": "svc",
            "group": "svc",
            "link_target": "/data/real"
        }))
        .unwrap();
        let out = serde_json::to_value(&entry).unwrap();
        assert_eq!(out["type"], "file");
        assert_eq!(out["user"], "svc");
        assert_eq!(out["link_target"], "/data/real");
    }

    #[test]
    fn test_dir_entry_modified_date() {
        let entry: DirEntry = serde_json::from_value(serde_json::json!({
            "DATA_TYPE": "file",
            "name": "old",
            "type": "dir",
            "size": 4096,
            "last_modified": "2024-03-01 23:59:59+00:00"
        }))
        .unwrap();

        assert_eq!(entry.entry_type, EntryType::Dir);
        assert_eq!(
            entry.modified_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_dir_entry_bad_date() {
        let entry = DirEntry {
            name: "x".to_string(),
            entry_type: EntryType::File,
            size: 0,
            last_modified: "yesterday".to_string(),
            permissions: None,
            extra: Default::default(),
        };
        assert!(entry.modified_date().is_err());
    }

    #[test]
    fn test_unknown_entry_type() {
        let entry_type: EntryType = serde_json::from_str("\"invalid_symlink\"").unwrap();
        assert_eq!(entry_type, EntryType::Other);
    }

    #[test]
    fn test_new_access_rule_read_write() {
        let rule = NewAccessRule::read_write("p-1", &SharedPath::new("bob"));
        assert_eq!(rule.path, "/bob/");
        assert_eq!(rule.permissions, "rw");
        assert_eq!(rule.principal_type, "identity");
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Active.is_terminal());
        let status: TaskStatus = serde_json::from_str("\"SUCCEEDED\"").unwrap();
        assert_eq!(status, TaskStatus::Succeeded);
    }
}
