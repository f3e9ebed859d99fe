//! Remote collection adapter for sharehub.
//!
//! This crate is the boundary to the external transfer service. It provides
//! a trait-based interface ([`TransferApi`]) over the operations the share
//! layer needs, the credential broker that mints scoped bearer tokens, an
//! HTTP implementation, and an in-memory implementation for tests.
//!
//! # Design Principles
//! - Remote errors are never reworded: status, code and message travel as
//!   [`sharehub_common::RemoteError`] and the share layer decides what they mean
//! - Every call takes the bearer token explicitly; nothing here is ambient
//! - No retries; transient failures surface directly

pub mod api;
pub mod auth;
pub mod client;
pub mod memory;

pub use api::{
    AccessRule, ByteStream, DirEntry, EntryType, Identity, NewAccessRule, TaskId, TaskStatus,
    TransferApi,
};
pub use auth::{AccessToken, BrokerConfig, CredentialBroker, OAuthBroker, ScopeFamily, StaticBroker, Tokens};
pub use client::{GlobusClient, GlobusConfig};
pub use memory::{MemoryTransfer, Operation};
