//! Instance directory structure
//!
//! Each instance is spread over three roots:
//!
//! ```text
//! <dataDir>/<id>/
//! ├── redis.conf              # merged configuration
//! ├── lock                    # provisioning marker
//! ├── redis-server.port       # sidecar written by the supervisor
//! ├── redis-server.password   # sidecar written by the supervisor
//! └── db/                     # redis-server working directory
//!     ├── dump.rdb
//!     └── appendonly.aof
//! <logDir>/<id>/
//! └── redis-server.log
//! <pidDir>/<id>.pid
//! ```

use std::path::{Path, PathBuf};

use sharedvm_core::layout::{
    CONFIG_FILE_NAME, DB_DIR_NAME, LOCK_FILE_NAME, LOG_FILE_NAME, PASSWORD_SIDECAR_NAME,
    PID_FILE_EXTENSION, PORT_SIDECAR_NAME, SNAPSHOT_FILE_NAME,
};
use sharedvm_core::ServiceConfig;

/// Path composition for one instance pool. No method touches the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    data_root: PathBuf,
    log_root: PathBuf,
    pid_root: PathBuf,
}

impl InstancePaths {
    /// Create paths from the three roots
    pub fn new(
        data_root: impl Into<PathBuf>,
        log_root: impl Into<PathBuf>,
        pid_root: impl Into<PathBuf>,
    ) -> Self {
        InstancePaths {
            data_root: data_root.into(),
            log_root: log_root.into(),
            pid_root: pid_root.into(),
        }
    }

    /// Roots taken from service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            &config.instance_data_directory,
            &config.instance_log_directory,
            &config.pidfile_directory,
        )
    }

    /// Parent of every instance data directory
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Parent of every instance log directory
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Directory holding pid files
    pub fn pid_root(&self) -> &Path {
        &self.pid_root
    }

    /// `<dataDir>/<id>`
    pub fn data_dir(&self, id: &str) -> PathBuf {
        self.data_root.join(id)
    }

    /// `<dataDir>/<id>/db`
    pub fn db_dir(&self, id: &str) -> PathBuf {
        self.data_dir(id).join(DB_DIR_NAME)
    }

    /// `<dataDir>/<id>/db/dump.rdb`
    pub fn snapshot_path(&self, id: &str) -> PathBuf {
        self.db_dir(id).join(SNAPSHOT_FILE_NAME)
    }

    /// `<dataDir>/<id>/redis.conf`
    pub fn config_path(&self, id: &str) -> PathBuf {
        self.data_dir(id).join(CONFIG_FILE_NAME)
    }

    /// `<dataDir>/<id>/lock`
    pub fn lock_path(&self, id: &str) -> PathBuf {
        self.data_dir(id).join(LOCK_FILE_NAME)
    }

    /// `<dataDir>/<id>/redis-server.port`
    pub fn port_sidecar(&self, id: &str) -> PathBuf {
        self.data_dir(id).join(PORT_SIDECAR_NAME)
    }

    /// `<dataDir>/<id>/redis-server.password`
    pub fn password_sidecar(&self, id: &str) -> PathBuf {
        self.data_dir(id).join(PASSWORD_SIDECAR_NAME)
    }

    /// `<logDir>/<id>`
    pub fn log_dir(&self, id: &str) -> PathBuf {
        self.log_root.join(id)
    }

    /// `<logDir>/<id>/redis-server.log`
    pub fn log_file(&self, id: &str) -> PathBuf {
        self.log_dir(id).join(LOG_FILE_NAME)
    }

    /// `<pidDir>/<id>.pid`
    pub fn pid_file(&self, id: &str) -> PathBuf {
        self.pid_root.join(format!("{}.{}", id, PID_FILE_EXTENSION))
    }
}
