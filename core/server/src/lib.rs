//! HTTP surface for sharehub.
//!
//! Thin axum layer: handlers parse query parameters, call the
//! [`sharehub_share::ShareService`], and translate errors into status codes.

pub mod auth;
pub mod error;
pub mod extract;
pub mod log_level;
pub mod routes;
pub mod server;

use std::sync::Arc;

use sharehub_share::ShareService;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ShareService,
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: Arc<str>,
    /// Runtime filter control; absent when no reloadable subscriber is installed.
    pub log_level: Option<LogLevel>,
}

impl AppState {
    pub fn new(service: ShareService, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            api_key: api_key.into(),
            log_level: None,
        }
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = Some(log_level);
        self
    }
}

pub use error::ApiError;
pub use log_level::{FilterHandle, LogLevel};
pub use routes::router;
pub use server::{run, ServerConfig};
