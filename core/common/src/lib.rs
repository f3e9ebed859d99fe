//! Common utilities and types shared across the sharehub crates.
//!
//! This crate holds the error taxonomy every layer maps into, and the
//! canonical path type used to compare directories against access rules.

pub mod error;
pub mod types;

pub use error::{Error, RemoteError, Result, MKDIR_EXISTS_CODE};
pub use types::SharedPath;
