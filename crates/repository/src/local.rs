//! Local filesystem repository
//!
//! `LocalRepository` owns the on-disk representation of every instance in
//! one pool. It holds only its configured roots; there is no global state and
//! no cache.
//!
//! # Setup
//!
//! Setup is three independently idempotent steps with no rollback:
//! 1. Create `<dataDir>/<id>/db` and `<logDir>/<id>`
//! 2. Merge the default template with instance overrides into `redis.conf`
//! 3. Write the `lock` marker
//!
//! A crash between steps is repaired by running Setup again. Re-running never
//! clears the data or log directories.
//!
//! # Delete
//!
//! Delete attempts all three removals (data directory, pid file, log
//! directory) even after a failure and returns the first error. Locations that
//! are already gone count as removed, so deleting twice succeeds.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sharedvm_conf::{ConfError, Override, RedisConf};
use sharedvm_core::layout::server_name;
use sharedvm_core::{Error, Instance, Result, ServiceConfig, PLAN};
use tracing::{error, info, warn};

use crate::paths::InstancePaths;

pub(crate) const TARGET: &str = "sharedvm::repository";

/// Filesystem-backed instance repository
#[derive(Debug, Clone)]
pub struct LocalRepository {
    config: ServiceConfig,
    paths: InstancePaths,
}

impl LocalRepository {
    /// Create a repository over the roots named in `config`
    pub fn new(config: ServiceConfig) -> Self {
        let paths = InstancePaths::from_config(&config);
        LocalRepository { config, paths }
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Path composition for this pool
    pub fn paths(&self) -> &InstancePaths {
        &self.paths
    }

    /// Data root
    pub fn data_dir(&self) -> &Path {
        self.paths.data_root()
    }

    /// `<dataDir>/<id>`
    pub fn instance_data_dir(&self, id: &str) -> PathBuf {
        self.paths.data_dir(id)
    }

    /// `<logDir>/<id>`
    pub fn instance_log_dir(&self, id: &str) -> PathBuf {
        self.paths.log_dir(id)
    }

    /// `<dataDir>/<id>/redis.conf`
    pub fn instance_config_path(&self, id: &str) -> PathBuf {
        self.paths.config_path(id)
    }

    /// `<pidDir>/<id>.pid`
    pub fn instance_pid_file_path(&self, id: &str) -> PathBuf {
        self.paths.pid_file(id)
    }

    /// Process id recorded for an instance
    pub fn instance_pid(&self, id: &str) -> Result<u32> {
        let path = self.paths.pid_file(id);
        let content =
            fs::read_to_string(&path).map_err(|e| Error::io("read pid file", &path, e))?;
        content.trim().parse().map_err(|e| Error::PidParse {
            path,
            reason: format!("{:?}: {}", content.trim(), e),
        })
    }

    /// Create the data, `db` and log directories if missing.
    pub fn ensure_directories_exist(&self, instance: &Instance) -> Result<()> {
        let db_dir = self.paths.db_dir(&instance.id);
        fs::create_dir_all(&db_dir).map_err(|e| Error::io("create data directory", &db_dir, e))?;

        let log_dir = self.paths.log_dir(&instance.id);
        fs::create_dir_all(&log_dir).map_err(|e| Error::io("create log directory", &log_dir, e))?;
        Ok(())
    }

    /// Instance-specific overrides applied on top of the default template
    pub fn instance_overrides(&self, instance: &Instance) -> Vec<Override> {
        let id = instance.id.as_str();
        let mut overrides = vec![
            Override::ServerName(server_name(id)),
            Override::WorkingDir(self.paths.db_dir(id)),
            Override::LogFile(self.paths.log_file(id)),
            Override::PidFile(self.paths.pid_file(id)),
            Override::Port(instance.port),
            Override::Password(instance.password.clone()),
        ];
        if let Some(maxmemory) = &self.config.maxmemory {
            overrides.push(Override::MaxMemory(maxmemory.clone()));
        }
        if let Some(appendonly) = self.config.appendonly {
            overrides.push(Override::AppendOnly(appendonly));
        }
        overrides
    }

    /// Regenerate `redis.conf` from the default template.
    ///
    /// The file is fully replaced, never patched.
    pub fn write_config_file(&self, instance: &Instance) -> Result<()> {
        let template = &self.config.default_config_path;
        let conf = sharedvm_conf::merge(template, &self.instance_overrides(instance))
            .map_err(|e| conf_error("read default config", template, e))?;

        let path = self.paths.config_path(&instance.id);
        conf.save(&path)
            .map_err(|e| conf_error("write config file", &path, e))
    }

    /// Write the provisioning marker
    pub fn lock(&self, instance: &Instance) -> Result<()> {
        let path = self.paths.lock_path(&instance.id);
        File::create(&path)
            .map(drop)
            .map_err(|e| Error::io("write lock file", &path, e))
    }

    /// Remove the provisioning marker; a missing marker is not an error
    pub fn unlock(&self, instance: &Instance) -> Result<()> {
        let path = self.paths.lock_path(&instance.id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("remove lock file", &path, e)),
        }
    }

    /// Whether the provisioning marker is present
    pub fn is_locked(&self, id: &str) -> bool {
        self.paths.lock_path(id).is_file()
    }

    /// First-time provisioning: directories, configuration, lock marker.
    ///
    /// The first failing step is logged with its step name and returned;
    /// earlier steps are not undone.
    pub fn setup(&self, instance: &Instance) -> Result<()> {
        let id = instance.id.as_str();
        self.ensure_directories_exist(instance)
            .map_err(|e| log_setup_failure(id, "ensure-dirs-exist", e))?;
        self.write_config_file(instance)
            .map_err(|e| log_setup_failure(id, "write-config", e))?;
        self.lock(instance)
            .map_err(|e| log_setup_failure(id, "lock", e))?;

        info!(
            target: TARGET,
            event = "provision-instance",
            instance_id = %instance.id,
            plan = PLAN,
            "Successfully provisioned Redis instance"
        );
        Ok(())
    }

    /// Rebuild an instance from its configuration file.
    ///
    /// The password comes from `requirepass`, falling back to the password
    /// sidecar when the configuration has none.
    pub fn find_by_id(&self, id: &str) -> Result<Instance> {
        let path = self.paths.config_path(id);
        let conf = match RedisConf::load(&path) {
            Ok(conf) => conf,
            Err(ConfError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    id: id.to_string(),
                    path,
                })
            }
            Err(e) => return Err(conf_error("read config file", &path, e)),
        };

        let port = conf
            .port()
            .map_err(|e| conf_error("read config file", &path, e))?;
        let password = match conf.password() {
            Some(password) => password.to_string(),
            None => self.read_password_sidecar(id)?.unwrap_or_default(),
        };

        Ok(Instance {
            id: id.to_string(),
            host: self.config.host.clone(),
            port,
            password,
        })
    }

    /// True iff the configuration file is present and readable.
    pub fn instance_exists(&self, id: &str) -> Result<bool> {
        let path = self.paths.config_path(id);
        match File::open(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io("open config file", &path, e)),
        }
    }

    /// Remove the data directory, pid file and log directory.
    pub fn delete(&self, id: &str) -> Result<()> {
        let removals = [
            ("remove data directory", self.paths.data_dir(id), true),
            ("remove pid file", self.paths.pid_file(id), false),
            ("remove log directory", self.paths.log_dir(id), true),
        ];

        let mut first_error = None;
        for (op, path, is_dir) in removals {
            let result = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(
                        target: TARGET,
                        instance_id = %id,
                        path = %path.display(),
                        error = %e,
                        "Failed to {}", op
                    );
                    first_error.get_or_insert(Error::io(op, &path, e));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(
            target: TARGET,
            event = "deprovision-instance",
            instance_id = %id,
            plan = PLAN,
            "Successfully deprovisioned Redis instance"
        );
        Ok(())
    }

    fn read_password_sidecar(&self, id: &str) -> Result<Option<String>> {
        let path = self.paths.password_sidecar(id);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io("read password sidecar", &path, e)),
        }
    }
}

fn log_setup_failure(instance_id: &str, step: &'static str, e: Error) -> Error {
    error!(
        target: TARGET,
        instance_id,
        step,
        error = %e,
        "Failed to provision Redis instance"
    );
    e
}

fn conf_error(op: &'static str, path: &Path, e: ConfError) -> Error {
    match e {
        ConfError::Io { path, source, .. } => Error::io(op, path, source),
        other => Error::InvalidConfiguration {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}
