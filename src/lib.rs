//! sharedvm - on-disk lifecycle and backup for pooled shared-vm Redis instances
//!
//! Each instance is a tenant sharing one host, materialized as a data
//! directory holding a generated `redis.conf`, a log directory and a pid file.
//!
//! # Quick Start
//!
//! ```ignore
//! use sharedvm::{Instance, LocalRepository, ServiceConfig};
//!
//! let config = ServiceConfig::from_file(Path::new("/etc/sharedvm.toml"))?;
//! let repo = LocalRepository::new(config);
//!
//! repo.setup(&Instance::new("abc", "10.0.0.5", 6380, "secret"))?;
//! let instance = repo.find_by_id("abc")?;
//! repo.delete("abc")?;
//! ```
//!
//! # Architecture
//!
//! - [`Instance`], [`Error`], [`ServiceConfig`], [`layout`]: shared types
//! - [`conf`]: `redis.conf` parsing and override merging
//! - [`repository`]: [`LocalRepository`], the on-disk state model
//! - [`backup`]: [`Backup`], snapshot-and-upload to object storage

pub use sharedvm_backup as backup;
pub use sharedvm_conf as conf;
pub use sharedvm_repository as repository;

pub use sharedvm_backup::{Backup, BackupOutcome, LocalObjectStore, S3Client};
pub use sharedvm_core::{
    layout, BackupConfig, ConfigError, Error, Instance, Result, ServiceConfig, PLAN,
};
pub use sharedvm_repository::{InstancePaths, LocalRepository};
