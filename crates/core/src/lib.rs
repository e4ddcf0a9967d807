//! Core types for sharedvm
//!
//! This crate defines the foundational types shared by the repository and
//! backup layers:
//! - Instance: one tenant's Redis deployment, rebuilt from disk on every read
//! - Error: error taxonomy for repository and backup operations
//! - ServiceConfig / BackupConfig: root paths and object storage settings
//! - layout: on-disk file and directory names

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod instance;
pub mod layout;

pub use config::{BackupConfig, ConfigError, ServiceConfig};
pub use error::{Error, Result};
pub use instance::Instance;
pub use layout::PLAN;
