//! Backup Pipeline for sharedvm
//!
//! Snapshots an instance's dataset with `BGSAVE` and uploads the resulting
//! `dump.rdb` to object storage:
//!
//! 1. Get or create the target bucket
//! 2. Load `redis.conf`, overlay the port and password sidecars, connect
//! 3. `BGSAVE` and wait (bounded by the configured timeout)
//! 4. Skip if `db/dump.rdb` is absent
//! 5. Upload the artifact to `<prefix>/<instance_id>`
//!
//! Each step aborts the pipeline on failure; nothing is retried here.
//!
//! - [`Backup`]: the pipeline
//! - [`ObjectStore`] / [`Bucket`]: storage seam, with [`S3Client`] and
//!   [`LocalObjectStore`]
//! - [`Connector`] / [`SnapshotClient`]: data-store seam, with
//!   [`TcpConnector`] and [`RedisControlClient`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod pipeline;
pub mod s3;
pub mod store;

pub use client::{Connector, RedisControlClient, Reply, SnapshotClient, TcpConnector};
pub use pipeline::{Backup, BackupOutcome};
pub use s3::{S3Bucket, S3Client};
pub use store::{Bucket, LocalBucket, LocalObjectStore, ObjectStore};
