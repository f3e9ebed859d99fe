//! In-memory transfer adapter for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use sharehub_common::{Error, RemoteError, Result, SharedPath, MKDIR_EXISTS_CODE};

use crate::api::{
    AccessRule, ByteStream, DirEntry, EntryType, Identity, NewAccessRule, TaskId, TaskStatus,
    TransferApi,
};
use crate::auth::AccessToken;

/// Remote operation a failure can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Mkdir,
    Ls,
    AclList,
    AclAdd,
    AclDelete,
    SubmitDelete,
}

#[derive(Debug, Default)]
struct State {
    /// Username to identities.
    identities: HashMap<String, Vec<Identity>>,
    /// Canonical directory path to modification timestamp.
    dirs: BTreeMap<String, String>,
    /// File path (no trailing slash) to content.
    files: HashMap<String, Vec<u8>>,
    rules: Vec<AccessRule>,
    tasks: HashMap<TaskId, TaskStatus>,
    submitted: Vec<String>,
    /// Outcome given to new delete tasks; `None` completes them immediately.
    task_outcome: Option<TaskStatus>,
    /// Failures keyed by operation and target (path, canonical path or rule id).
    failures: HashMap<(Operation, String), RemoteError>,
    next_rule: u64,
}

/// In-memory transfer adapter.
///
/// Models a single collection: directories with modification times, files,
/// access rules, identities and delete tasks. Useful for testing; every
/// error it raises uses the same codes as the real service.
#[derive(Clone)]
pub struct MemoryTransfer {
    state: Arc<RwLock<State>>,
}

impl MemoryTransfer {
    /// Create a new collection containing only the root directory.
    pub fn new() -> Self {
        let mut state = State::default();
        state.dirs.insert("/".to_string(), Self::now_stamp());

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn now_stamp() -> String {
        Utc::now().format("%Y-%m-%d %H:%M:%S+00:00").to_string()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn not_found(what: &str) -> Error {
        Error::Remote(RemoteError::new(
            404,
            "ClientError.NotFound",
            format!("{} not found", what),
        ))
    }

    fn check_failure(&self, operation: Operation, target: &str) -> Result<()> {
        match self.read().failures.get(&(operation, target.to_string())) {
            Some(err) => Err(Error::Remote(err.clone())),
            None => Ok(()),
        }
    }

    /// Register an identity under a username.
    pub fn add_identity(&self, username: &str, principal: &str) {
        let identity = Identity {
            id: principal.to_string(),
            username: username.to_string(),
            name: None,
            email: Some(username.to_string()),
        };
        self.write()
            .identities
            .entry(username.to_string())
            .or_default()
            .push(identity);
    }

    /// Create a directory with the given modification timestamp.
    ///
    /// Missing parents are created with the same timestamp.
    pub fn add_dir(&self, path: &str, last_modified: &str) {
        let path = SharedPath::new(path);
        let mut state = self.write();
        let mut current = String::from("/");
        for component in path.as_str().split('/').filter(|c| !c.is_empty()) {
            current = format!("{}{}/", current, component);
            state
                .dirs
                .entry(current.clone())
                .or_insert_with(|| last_modified.to_string());
        }
        state.dirs.insert(path.to_string(), last_modified.to_string());
    }

    /// Store a file.
    pub fn add_file(&self, path: &str, data: impl Into<Vec<u8>>) {
        let key = format!("/{}", path.trim_start_matches('/'));
        self.write().files.insert(key, data.into());
    }

    /// Add an access rule directly, returning its id.
    pub fn add_rule(&self, principal: &str, path: &str) -> String {
        let mut state = self.write();
        state.next_rule += 1;
        let id = format!("rule-{}", state.next_rule);
        state.rules.push(AccessRule {
            id: id.clone(),
            principal_type: "identity".to_string(),
            principal: principal.to_string(),
            path: path.to_string(),
            permissions: "rw".to_string(),
            extra: Default::default(),
        });
        id
    }

    /// Make an operation fail for one target.
    ///
    /// Targets are canonical paths for mkdir/ls/acl-add/delete, the rule id for
    /// acl-delete, and an empty string for acl-list.
    pub fn inject_failure(&self, operation: Operation, target: &str, err: RemoteError) {
        self.write()
            .failures
            .insert((operation, target.to_string()), err);
    }

    /// Status given to delete tasks submitted from now on.
    ///
    /// `Succeeded` (the default) removes the directory at submission time;
    /// any other status leaves it in place.
    pub fn set_task_outcome(&self, status: TaskStatus) {
        self.write().task_outcome = Some(status);
    }

    /// Paths submitted for deletion, in order.
    pub fn submitted_deletes(&self) -> Vec<String> {
        self.read().submitted.clone()
    }

    /// Current access rules.
    pub fn rules(&self) -> Vec<AccessRule> {
        self.read().rules.clone()
    }

    /// Whether a directory exists.
    pub fn dir_exists(&self, path: &str) -> bool {
        self.read().dirs.contains_key(SharedPath::new(path).as_str())
    }

    /// Remove a directory and everything below it, leaving rules untouched.
    pub fn remove_dir(&self, path: &str) {
        let prefix = SharedPath::new(path).to_string();
        let mut state = self.write();
        state.dirs.retain(|dir, _| !dir.starts_with(&prefix));
        state.files.retain(|file, _| !file.starts_with(&prefix));
    }
}

impl Default for MemoryTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferApi for MemoryTransfer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_identities(&self, _token: &AccessToken, username: &str) -> Result<Vec<Identity>> {
        Ok(self
            .read()
            .identities
            .get(username)
            .cloned()
            .unwrap_or_default())
    }

    async fn mkdir(&self, _token: &AccessToken, path: &str) -> Result<()> {
        let path = SharedPath::new(path);
        self.check_failure(Operation::Mkdir, path.as_str())?;

        let mut state = self.write();
        if state.dirs.contains_key(path.as_str()) {
            return Err(Error::Remote(RemoteError::new(
                502,
                MKDIR_EXISTS_CODE,
                format!("Path already exists: {}", path),
            )));
        }

        let parent = match path.as_str().trim_end_matches('/').rfind('/') {
            Some(i) => SharedPath::new(&path.as_str()[..i]),
            None => SharedPath::root(),
        };
        if !state.dirs.contains_key(parent.as_str()) {
            return Err(Self::not_found(&format!("Directory {}", parent)));
        }

        state.dirs.insert(path.to_string(), Self::now_stamp());
        Ok(())
    }

    async fn ls(&self, _token: &AccessToken, path: &str) -> Result<Vec<DirEntry>> {
        let path = SharedPath::new(path);
        self.check_failure(Operation::Ls, path.as_str())?;

        let state = self.read();
        if !state.dirs.contains_key(path.as_str()) {
            return Err(Self::not_found(&format!("Directory {}", path)));
        }

        let prefix = path.as_str();
        let mut entries = Vec::new();

        for (dir, modified) in state.dirs.iter() {
            if let Some(relative) = dir.strip_prefix(prefix) {
                let name = relative.trim_end_matches('/');
                // Only direct children
                if !name.is_empty() && !name.contains('/') {
                    entries.push(DirEntry {
                        name: name.to_string(),
                        entry_type: EntryType::Dir,
                        size: 0,
                        last_modified: modified.clone(),
                        permissions: Some("0755".to_string()),
                        extra: Default::default(),
                    });
                }
            }
        }

        for (file, data) in state.files.iter() {
            if let Some(name) = file.strip_prefix(prefix) {
                if !name.is_empty() && !name.contains('/') {
                    entries.push(DirEntry {
                        name: name.to_string(),
                        entry_type: EntryType::File,
                        size: data.len() as u64,
                        last_modified: state.dirs[prefix].clone(),
                        permissions: Some("0644".to_string()),
                        extra: Default::default(),
                    });
                }
            }
        }

        Ok(entries)
    }

    async fn acl_list(&self, _token: &AccessToken) -> Result<Vec<AccessRule>> {
        self.check_failure(Operation::AclList, "")?;
        Ok(self.read().rules.clone())
    }

    async fn acl_add(&self, _token: &AccessToken, rule: &NewAccessRule) -> Result<String> {
        self.check_failure(Operation::AclAdd, SharedPath::new(&rule.path).as_str())?;

        let mut state = self.write();
        state.next_rule += 1;
        let id = format!("rule-{}", state.next_rule);
        state.rules.push(AccessRule {
            id: id.clone(),
            principal_type: rule.principal_type.clone(),
            principal: rule.principal.clone(),
            path: rule.path.clone(),
            permissions: rule.permissions.clone(),
            extra: Default::default(),
        });
        Ok(id)
    }

    async fn acl_delete(&self, _token: &AccessToken, rule_id: &str) -> Result<()> {
        self.check_failure(Operation::AclDelete, rule_id)?;

        let mut state = self.write();
        let before = state.rules.len();
        state.rules.retain(|rule| rule.id != rule_id);
        if state.rules.len() == before {
            return Err(Self::not_found(&format!("Access rule {}", rule_id)));
        }
        Ok(())
    }

    async fn submit_delete(
        &self,
        _token: &AccessToken,
        path: &str,
        _recursive: bool,
    ) -> Result<TaskId> {
        self.check_failure(Operation::SubmitDelete, SharedPath::new(path).as_str())?;

        let task_id = TaskId::new(Uuid::new_v4().to_string());
        let outcome = self.read().task_outcome.unwrap_or(TaskStatus::Succeeded);

        if outcome == TaskStatus::Succeeded {
            self.remove_dir(path);
        }

        let mut state = self.write();
        state.submitted.push(path.to_string());
        state.tasks.insert(task_id.clone(), outcome);
        Ok(task_id)
    }

    async fn task_status(&self, _token: &AccessToken, task_id: &TaskId) -> Result<TaskStatus> {
        self.read()
            .tasks
            .get(task_id)
            .copied()
            .ok_or_else(|| Self::not_found(&format!("Task {}", task_id)))
    }

    async fn fetch_file(&self, _token: &AccessToken, path: &str) -> Result<ByteStream> {
        let key = format!("/{}", path.trim_start_matches('/'));
        let data = self.read().files.get(&key).cloned().ok_or_else(|| {
            Error::Remote(RemoteError::new(404, "", format!("File not found: {}", key)))
        })?;

        let stream = stream::once(async move { Ok(Bytes::from(data)) });
        Ok(Box::pin(stream))
    }
}
