//! Profile-based configuration file.
//!
//! The file is TOML with one table per profile:
//!
//! ```toml
//! [TEST]
//! port = 8090
//! client_id = "..."
//! client_secret = "..."
//! api_key = "..."
//! collection_id = "0a1b2c3d-0000-4000-8000-000000000000"
//! collection_https_server = "https://g-12ab.data.globus.org"
//! log_level = "info"
//! log_dir = "/var/log/sharehub"
//! ```

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use sharehub_common::{Error, Result};
use sharehub_server::ServerConfig;
use sharehub_share::{ShareConfig, MIN_RETENTION_DAYS};
use sharehub_transfer::auth::DEFAULT_TOKEN_URL;
use sharehub_transfer::client::{DEFAULT_AUTH_BASE, DEFAULT_TRANSFER_BASE};
use sharehub_transfer::{BrokerConfig, GlobusConfig};

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_floor() -> i64 {
    MIN_RETENTION_DAYS
}

fn default_task_wait_timeout() -> u64 {
    300
}

fn default_task_poll_interval() -> u64 {
    2
}

fn default_http_timeout() -> u64 {
    60
}

/// One profile of the configuration file.
#[derive(Clone, Deserialize)]
pub struct Profile {
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    pub client_id: String,
    pub client_secret: String,
    pub api_key: String,
    pub collection_id: Uuid,
    pub collection_https_server: Url,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_retention_floor")]
    pub retention_floor_days: i64,
    #[serde(default)]
    pub token_cache: bool,
    #[serde(default = "default_task_wait_timeout")]
    pub task_wait_timeout_secs: u64,
    #[serde(default = "default_task_poll_interval")]
    pub task_poll_interval_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub token_url: Option<Url>,
    #[serde(default)]
    pub auth_base_url: Option<Url>,
    #[serde(default)]
    pub transfer_base_url: Option<Url>,
}

/// Load and validate one profile from a configuration file.
///
/// # Errors
/// - File unreadable or not TOML
/// - Profile missing, malformed or failing validation
pub fn load_profile(path: &Path, profile: &str) -> Result<Profile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    parse_profile(&text, profile)
}

/// Parse one profile out of TOML text.
pub fn parse_profile(text: &str, profile: &str) -> Result<Profile> {
    let mut table: toml::Table =
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;

    let section = table
        .remove(profile)
        .ok_or_else(|| Error::Config(format!("Profile '{}' not found", profile)))?;

    let parsed: Profile = section
        .try_into()
        .map_err(|e| Error::Config(format!("Invalid profile '{}': {}", profile, e)))?;

    parsed.validate()?;
    Ok(parsed)
}

impl Profile {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("api_key", &self.api_key),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        if self.task_poll_interval_secs == 0 {
            return Err(Error::Config(
                "task_poll_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn share_config(&self) -> ShareConfig {
        ShareConfig::default()
            .with_retention_floor(self.retention_floor_days)
            .with_task_wait(
                Duration::from_secs(self.task_wait_timeout_secs),
                Duration::from_secs(self.task_poll_interval_secs),
            )
    }

    pub fn globus_config(&self) -> GlobusConfig {
        let base = |url: &Option<Url>, default: &str| {
            url.as_ref()
                .map(|u| u.as_str().trim_end_matches('/').to_string())
                .unwrap_or_else(|| default.to_string())
        };

        GlobusConfig {
            collection_id: self.collection_id.to_string(),
            collection_https_server: self.collection_https_server.to_string(),
            transfer_base_url: base(&self.transfer_base_url, DEFAULT_TRANSFER_BASE),
            auth_base_url: base(&self.auth_base_url, DEFAULT_AUTH_BASE),
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            token_url: self
                .token_url
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            collection_id: self.collection_id.to_string(),
            cache_tokens: self.token_cache,
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::new(self.host, self.port),
            api_key: self.api_key.clone(),
        }
    }
}

/// Summary with secrets redacted.
impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "listen:            {}:{}", self.host, self.port)?;
        writeln!(f, "client_id:         {}", self.client_id)?;
        writeln!(f, "client_secret:     [REDACTED]")?;
        writeln!(f, "api_key:           [REDACTED]")?;
        writeln!(f, "collection:        {}", self.collection_id)?;
        writeln!(f, "https server:      {}", self.collection_https_server)?;
        writeln!(f, "retention floor:   {} days", self.share_config().retention_floor_days())?;
        writeln!(f, "token cache:       {}", self.token_cache)?;
        writeln!(f, "task wait timeout: {}s", self.task_wait_timeout_secs)?;
        match &self.log_dir {
            Some(dir) => write!(f, "log:               {} ({})", dir.display(), self.log_level),
            None => write!(f, "log:               stderr ({})", self.log_level),
        }
    }
}
