//! Shared-directory lifecycle for sharehub.
//!
//! Directories are provisioned per identity, shared through access rules,
//! and cleaned up by reconciliation (zombie rules) and retention (age-based
//! deletion). Nothing is stored locally: every decision is made against the
//! remote collection's current filesystem and access-rule list.
//!
//! Every operation authorizes afresh through the injected
//! [`sharehub_transfer::CredentialBroker`] and then drives the
//! [`sharehub_transfer::TransferApi`].

pub mod collection;
pub mod config;
pub mod provisioner;
pub mod reconciler;
pub mod retention;
pub mod service;

pub use collection::Collection;
pub use config::{ShareConfig, MIN_RETENTION_DAYS};
pub use provisioner::Provisioner;
pub use reconciler::Reconciler;
pub use retention::RetentionSweeper;
pub use service::ShareService;
