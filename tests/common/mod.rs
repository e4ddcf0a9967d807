//! Shared fixtures for the cross-crate lifecycle suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sharedvm::backup::{Connector, SnapshotClient};
use sharedvm::conf::RedisConf;
use sharedvm::{BackupConfig, Error, LocalRepository, Result, ServiceConfig};
use tempfile::TempDir;

pub const TEMPLATE: &str = "\
# shared-vm template
daemonize yes
save 900 1
save 300 10
maxclients 100
";

/// A complete host layout: template, roots, config file and object store.
pub struct Host {
    pub dir: TempDir,
    pub repo: LocalRepository,
}

impl Host {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Build the host from a TOML service config written to disk.
    pub fn with_config(adjust: impl FnOnce(ServiceConfig) -> ServiceConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("template.conf"), TEMPLATE).unwrap();
        for sub in ["data", "log", "run"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }

        let toml = format!(
            r#"
host = "10.0.0.5"
default_config_path = "{root}/template.conf"
instance_data_directory = "{root}/data"
instance_log_directory = "{root}/log"
pidfile_directory = "{root}/run"

[backup]
endpoint_url = "http://127.0.0.1:9"
access_key_id = "AKID"
secret_access_key = "secret"
bucket_name = "redis-backups"
path = "shared-vm"
"#,
            root = root.display()
        );
        let config_path = root.join("sharedvm.toml");
        fs::write(&config_path, toml).unwrap();

        let config = adjust(ServiceConfig::from_file(&config_path).unwrap());
        Host {
            repo: LocalRepository::new(config),
            dir,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn backup_config(&self) -> BackupConfig {
        self.repo.config().backup.clone().unwrap()
    }

    /// Write the sidecars a running process manager would leave behind.
    pub fn start(&self, id: &str, pid: u32) {
        let instance = self.repo.find_by_id(id).unwrap();
        let data = self.repo.instance_data_dir(id);
        fs::write(data.join("redis-server.port"), instance.port.to_string()).unwrap();
        fs::write(data.join("redis-server.password"), &instance.password).unwrap();
        fs::write(self.repo.instance_pid_file_path(id), pid.to_string()).unwrap();
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Connector whose snapshot writes `dump.rdb` into the configured `dir`.
#[derive(Clone, Default)]
pub struct DumpingConnector {
    pub contents: Vec<u8>,
}

pub struct DumpingClient {
    dir: PathBuf,
    contents: Vec<u8>,
}

impl Connector for DumpingConnector {
    type Client = DumpingClient;

    fn connect(&self, _host: &str, conf: &RedisConf) -> Result<DumpingClient> {
        let dir = conf.get("dir").ok_or_else(|| Error::Connection {
            addr: "fake".to_string(),
            reason: "no dir directive".to_string(),
        })?;
        Ok(DumpingClient {
            dir: PathBuf::from(dir),
            contents: self.contents.clone(),
        })
    }
}

impl SnapshotClient for DumpingClient {
    fn create_snapshot(&mut self, _timeout_secs: u64) -> Result<()> {
        fs::write(self.dir.join("dump.rdb"), &self.contents).unwrap();
        Ok(())
    }
}

pub fn read_string(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}
