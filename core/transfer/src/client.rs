//! Globus Transfer and Auth API client.

use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;

use sharehub_common::{Error, RemoteError, Result};

use crate::api::{
    deserialize_id, AccessRule, ByteStream, DirEntry, Identity, NewAccessRule, TaskId, TaskStatus,
    TransferApi,
};
use crate::auth::AccessToken;

/// Transfer API base URL.
pub const DEFAULT_TRANSFER_BASE: &str = "https://transfer.api.globus.org/v0.10";
/// Auth API base URL.
pub const DEFAULT_AUTH_BASE: &str = "https://auth.globus.org";

/// Characters escaped inside a single path segment of the file URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Endpoints and collection the client talks to.
#[derive(Debug, Clone)]
pub struct GlobusConfig {
    /// Collection (endpoint) identifier.
    pub collection_id: String,
    /// HTTPS server of the collection, used for file retrieval.
    pub collection_https_server: String,
    /// Transfer API base URL.
    pub transfer_base_url: String,
    /// Auth API base URL.
    pub auth_base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GlobusConfig {
    /// Configuration against the public API endpoints.
    pub fn new(collection_id: impl Into<String>, collection_https_server: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            collection_https_server: collection_https_server.into(),
            transfer_base_url: DEFAULT_TRANSFER_BASE.to_string(),
            auth_base_url: DEFAULT_AUTH_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(rename = "DATA", default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct IdentityList {
    #[serde(default)]
    identities: Vec<Identity>,
}

#[derive(Debug, Deserialize)]
struct AccessCreated {
    #[serde(deserialize_with = "deserialize_id")]
    access_id: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionId {
    value: String,
}

#[derive(Debug, Deserialize)]
struct TaskSubmitted {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskDocument {
    status: TaskStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Build a [`RemoteError`] from a non-success response body.
///
/// Structured `{"code", "message"}` payloads are unpacked; anything else is
/// kept verbatim as the message.
pub fn parse_remote_error(status: u16, body: &str) -> RemoteError {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) if !payload.code.is_empty() || !payload.message.is_empty() => {
            RemoteError::new(status, payload.code, payload.message)
        }
        _ => RemoteError::new(status, "", body),
    }
}

/// Transfer API client for one collection.
pub struct GlobusClient {
    http: Client,
    config: GlobusConfig,
}

impl GlobusClient {
    /// Create a new client.
    ///
    /// # Errors
    /// - HTTP client construction failure
    pub fn new(config: GlobusConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("sharehub/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GlobusConfig {
        &self.config
    }

    fn endpoint_url(&self, suffix: &str) -> String {
        format!(
            "{}/endpoint/{}/{}",
            self.config.transfer_base_url, self.config.collection_id, suffix
        )
    }

    fn operation_url(&self, operation: &str) -> String {
        format!(
            "{}/operation/endpoint/{}/{}",
            self.config.transfer_base_url, self.config.collection_id, operation
        )
    }

    /// URL of a file on the collection's HTTPS server.
    pub fn file_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();
        format!(
            "{}/{}",
            self.config.collection_https_server.trim_end_matches('/'),
            encoded.join("/")
        )
    }

    /// Fetch a fresh submission id for a task.
    async fn submission_id(&self, token: &AccessToken) -> Result<String> {
        let url = format!("{}/submission_id", self.config.transfer_base_url);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get submission id: {}", e)))?;

        let submission: SubmissionId = self.handle_response(response).await?;
        Ok(submission.value)
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Remote(parse_remote_error(status.as_u16(), &body)))
        }
    }
}

#[async_trait]
impl TransferApi for GlobusClient {
    fn name(&self) -> &str {
        "globus"
    }

    async fn get_identities(&self, token: &AccessToken, username: &str) -> Result<Vec<Identity>> {
        let url = format!("{}/v2/api/identities", self.config.auth_base_url);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .query(&[("usernames", username)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to look up identity: {}", e)))?;

        let list: IdentityList = self.handle_response(response).await?;
        Ok(list.identities)
    }

    async fn mkdir(&self, token: &AccessToken, path: &str) -> Result<()> {
        let body = serde_json::json!({
            "DATA_TYPE": "mkdir",
            "path": path,
        });

        let response = self
            .http
            .post(self.operation_url("mkdir"))
            .header(header::AUTHORIZATION, token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create directory: {}", e)))?;

        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }

    async fn ls(&self, token: &AccessToken, path: &str) -> Result<Vec<DirEntry>> {
        let response = self
            .http
            .get(self.operation_url("ls"))
            .header(header::AUTHORIZATION, token.bearer())
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list directory: {}", e)))?;

        let list: DataList<DirEntry> = self.handle_response(response).await?;
        Ok(list.data)
    }

    async fn acl_list(&self, token: &AccessToken) -> Result<Vec<AccessRule>> {
        let response = self
            .http
            .get(self.endpoint_url("access_list"))
            .header(header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list access rules: {}", e)))?;

        let list: DataList<AccessRule> = self.handle_response(response).await?;
        Ok(list.data)
    }

    async fn acl_add(&self, token: &AccessToken, rule: &NewAccessRule) -> Result<String> {
        let body = serde_json::json!({
            "DATA_TYPE": "access",
            "principal_type": rule.principal_type,
            "principal": rule.principal,
            "path": rule.path,
            "permissions": rule.permissions,
        });

        let response = self
            .http
            .post(self.endpoint_url("access"))
            .header(header::AUTHORIZATION, token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to add access rule: {}", e)))?;

        let created: AccessCreated = self.handle_response(response).await?;
        Ok(created.access_id)
    }

    async fn acl_delete(&self, token: &AccessToken, rule_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint_url(&format!("access/{}", rule_id)))
            .header(header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete access rule: {}", e)))?;

        let _: serde_json::Value = self.handle_response(response).await?;
        Ok(())
    }

    async fn submit_delete(
        &self,
        token: &AccessToken,
        path: &str,
        recursive: bool,
    ) -> Result<TaskId> {
        let submission_id = self.submission_id(token).await?;
        let url = format!("{}/delete", self.config.transfer_base_url);

        let body = serde_json::json!({
            "DATA_TYPE": "delete",
            "submission_id": submission_id,
            "endpoint": self.config.collection_id,
            "recursive": recursive,
            "DATA": [{ "DATA_TYPE": "delete_item", "path": path }],
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to submit delete: {}", e)))?;

        let submitted: TaskSubmitted = self.handle_response(response).await?;
        Ok(TaskId::new(submitted.task_id))
    }

    async fn task_status(&self, token: &AccessToken, task_id: &TaskId) -> Result<TaskStatus> {
        let url = format!("{}/task/{}", self.config.transfer_base_url, task_id);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, token.bearer())
            .query(&[("fields", "status")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get task status: {}", e)))?;

        let task: TaskDocument = self.handle_response(response).await?;
        Ok(task.status)
    }

    async fn fetch_file(&self, token: &AccessToken, path: &str) -> Result<ByteStream> {
        let response = self
            .http
            .get(self.file_url(path))
            .header(header::AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to start download: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(RemoteError::new(status, "", body)));
        }

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| Error::Network(format!("Stream read error: {}", e))));

        Ok(Box::pin(stream))
    }
}
