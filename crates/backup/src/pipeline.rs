//! Backup pipeline
//!
//! `Backup::create` runs the steps strictly in order and stops at the first
//! failure:
//!
//! | Step              | Failure                                   |
//! |-------------------|-------------------------------------------|
//! | bucket            | `BucketProvision`, before any connection  |
//! | config + sidecars | IO / `InvalidConfiguration`, before BGSAVE |
//! | connect + BGSAVE  | `Connection` / `SnapshotCommand` / `SnapshotTimeout` |
//! | read artifact     | IO                                        |
//! | upload            | `Upload`                                  |
//!
//! A missing `db/dump.rdb` after a successful snapshot is a skip, not an
//! error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sharedvm_conf::{ConfError, Override, RedisConf};
use sharedvm_core::layout::{
    CONFIG_FILE_NAME, DB_DIR_NAME, PASSWORD_SIDECAR_NAME, PORT_SIDECAR_NAME, SNAPSHOT_FILE_NAME,
};
use sharedvm_core::{BackupConfig, Error, Result, ServiceConfig};
use tracing::{error, info};

use crate::client::{Connector, SnapshotClient, TcpConnector};
use crate::s3::S3Client;
use crate::store::{Bucket, ObjectStore};

const TARGET: &str = "sharedvm::backup";

/// Result of a successful backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Artifact uploaded
    Uploaded {
        /// Local artifact path
        local_file: PathBuf,
        /// Object path inside the bucket
        remote_path: String,
        /// Bytes uploaded
        bytes: usize,
    },
    /// No `dump.rdb` present; nothing uploaded
    Skipped {
        /// Artifact path that was checked
        local_file: PathBuf,
    },
}

/// Snapshot-and-upload pipeline
#[derive(Debug, Clone)]
pub struct Backup<S, C = TcpConnector> {
    config: BackupConfig,
    host: String,
    store: S,
    connector: C,
}

impl Backup<S3Client, TcpConnector> {
    /// Pipeline using S3 and TCP connections from service configuration.
    ///
    /// Returns `None` when no backup section is configured.
    pub fn from_service_config(service: &ServiceConfig) -> Option<Self> {
        let config = service.backup.clone()?;
        let store = S3Client::from_config(&config);
        Some(Backup::new(config, service.host.clone(), store, TcpConnector))
    }
}

impl<S: ObjectStore, C: Connector> Backup<S, C> {
    /// Create a pipeline
    pub fn new(config: BackupConfig, host: impl Into<String>, store: S, connector: C) -> Self {
        Backup {
            config,
            host: host.into(),
            store,
            connector,
        }
    }

    /// Backup configuration
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Snapshot the instance at `instance_path` and upload its artifact to
    /// `<path>/<instance_id>`.
    pub fn create(&self, instance_path: &Path, instance_id: &str) -> Result<BackupOutcome> {
        let bucket = self
            .store
            .get_or_create(&self.config.bucket_name)
            .map_err(|e| log_failure(instance_id, "provision bucket", e))?;

        self.create_snapshot(instance_path)
            .map_err(|e| log_failure(instance_id, "create snapshot", e))?;

        let artifact = instance_path.join(DB_DIR_NAME).join(SNAPSHOT_FILE_NAME);
        match fs::metadata(&artifact) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    target: TARGET,
                    instance_id,
                    local_file = %artifact.display(),
                    "dump.rdb not found, skipping instance backup"
                );
                return Ok(BackupOutcome::Skipped {
                    local_file: artifact,
                });
            }
            Err(e) => {
                let err = Error::io("stat snapshot artifact", &artifact, e);
                return Err(log_failure(instance_id, "read snapshot", err));
            }
        }

        self.upload(instance_id, artifact, &bucket)
            .map_err(|e| log_failure(instance_id, "upload snapshot", e))
    }

    fn create_snapshot(&self, instance_path: &Path) -> Result<()> {
        let conf = self.instance_conf(instance_path)?;
        let mut client = self.connector.connect(&self.host, &conf)?;
        client.create_snapshot(self.config.bg_save_timeout_seconds)
    }

    /// Instance `redis.conf` with the live port and password from the
    /// sidecar files
    fn instance_conf(&self, instance_path: &Path) -> Result<RedisConf> {
        let conf_path = instance_path.join(CONFIG_FILE_NAME);
        let mut conf = RedisConf::load(&conf_path).map_err(|e| match e {
            ConfError::Io { source, .. } => Error::io("read config file", &conf_path, source),
            other => Error::InvalidConfiguration {
                path: conf_path.clone(),
                reason: other.to_string(),
            },
        })?;

        for (key, name) in [("port", PORT_SIDECAR_NAME), ("requirepass", PASSWORD_SIDECAR_NAME)] {
            let path = instance_path.join(name);
            let value =
                fs::read_to_string(&path).map_err(|e| Error::io("read sidecar", &path, e))?;
            let o = Override::parse(key, &value).map_err(|e| Error::InvalidConfiguration {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            conf.apply(&o);
        }
        Ok(conf)
    }

    fn upload(
        &self,
        instance_id: &str,
        artifact: PathBuf,
        bucket: &S::Bucket,
    ) -> Result<BackupOutcome> {
        let data = fs::read(&artifact).map_err(|e| Error::io("read snapshot artifact", &artifact, e))?;
        let remote_path = self.config.remote_path(instance_id);

        info!(
            target: TARGET,
            instance_id,
            local_file = %artifact.display(),
            remote_file = %remote_path,
            bucket = bucket.name(),
            "Backing up instance"
        );
        bucket.upload(&data, &remote_path)?;

        Ok(BackupOutcome::Uploaded {
            local_file: artifact,
            remote_path,
            bytes: data.len(),
        })
    }
}

fn log_failure(instance_id: &str, step: &'static str, e: Error) -> Error {
    error!(target: TARGET, instance_id, step, error = %e, "Backup failed");
    e
}
