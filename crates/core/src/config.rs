//! Service and backup configuration
//!
//! Both structs deserialize from TOML. The repository and backup pipeline hold
//! them by value; nothing reads configuration from global state.
//!
//! # Example
//!
//! ```toml
//! host = "10.0.0.5"
//! default_config_path = "/var/vcap/jobs/redis/config/redis.conf"
//! instance_data_directory = "/var/vcap/store/redis/data"
//! instance_log_directory = "/var/vcap/sys/log/redis"
//! pidfile_directory = "/var/vcap/sys/run/redis"
//! maxmemory = "50mb"
//!
//! [backup]
//! endpoint_url = "https://s3.amazonaws.com"
//! s3_region = "us-east-1"
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! bucket_name = "redis-backups"
//! path = "shared-vm"
//! bg_save_timeout_seconds = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root paths and defaults for the shared-vm instance pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Address reported to clients of every instance
    #[serde(default = "default_host")]
    pub host: String,
    /// Base `redis.conf` template merged into every instance config
    pub default_config_path: PathBuf,
    /// Parent of every `<id>` data directory
    pub instance_data_directory: PathBuf,
    /// Parent of every `<id>` log directory
    pub instance_log_directory: PathBuf,
    /// Directory holding `<id>.pid` files
    pub pidfile_directory: PathBuf,
    /// Per-instance `maxmemory` override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxmemory: Option<String>,
    /// Per-instance `appendonly` override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appendonly: Option<bool>,
    /// Backup settings; absent when backups are disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupConfig>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Object storage target and snapshot timeout for the backup pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupConfig {
    /// Object storage endpoint, e.g. `https://s3.amazonaws.com`
    pub endpoint_url: String,
    /// Signing region
    #[serde(default = "default_region")]
    pub s3_region: String,
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket receiving snapshot artifacts
    pub bucket_name: String,
    /// Remote path prefix; artifacts land at `<path>/<instance_id>`
    pub path: String,
    /// How long to wait for `BGSAVE` to complete
    #[serde(default = "default_bg_save_timeout_seconds")]
    pub bg_save_timeout_seconds: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bg_save_timeout_seconds() -> u64 {
    10
}

impl ServiceConfig {
    /// Config rooted at the given directories with the default host.
    pub fn new(
        default_config_path: impl Into<PathBuf>,
        instance_data_directory: impl Into<PathBuf>,
        instance_log_directory: impl Into<PathBuf>,
        pidfile_directory: impl Into<PathBuf>,
    ) -> Self {
        ServiceConfig {
            host: default_host(),
            default_config_path: default_config_path.into(),
            instance_data_directory: instance_data_directory.into(),
            instance_log_directory: instance_log_directory.into(),
            pidfile_directory: pidfile_directory.into(),
            maxmemory: None,
            appendonly: None,
            backup: None,
        }
    }

    /// Set the host reported for instances
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the `maxmemory` override
    pub fn with_maxmemory(mut self, maxmemory: impl Into<String>) -> Self {
        self.maxmemory = Some(maxmemory.into());
        self
    }

    /// Set the `appendonly` override
    pub fn with_appendonly(mut self, appendonly: bool) -> Self {
        self.appendonly = Some(appendonly);
        self
    }

    /// Attach backup settings
    pub fn with_backup(mut self, backup: BackupConfig) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Missing("host"));
        }
        for (field, path) in [
            ("default_config_path", &self.default_config_path),
            ("instance_data_directory", &self.instance_data_directory),
            ("instance_log_directory", &self.instance_log_directory),
            ("pidfile_directory", &self.pidfile_directory),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Missing(field));
            }
        }
        if let Some(backup) = &self.backup {
            backup.validate()?;
        }
        Ok(())
    }
}

impl BackupConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_url.is_empty() {
            return Err(ConfigError::Missing("backup.endpoint_url"));
        }
        if self.bucket_name.is_empty() {
            return Err(ConfigError::Missing("backup.bucket_name"));
        }
        if self.bg_save_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "backup.bg_save_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Remote object path for an instance's artifact.
    pub fn remote_path(&self, instance_id: &str) -> String {
        format!("{}/{}", self.path, instance_id)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Required field empty
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// Field present but unusable
    #[error("invalid setting: {0}")]
    Invalid(String),
}
