//! On-disk names
//!
//! An external supervisor starts `redis-server` from these files, so the names
//! are fixed:
//!
//! ```text
//! <dataDir>/<id>/redis.conf
//! <dataDir>/<id>/lock
//! <dataDir>/<id>/db/
//! <dataDir>/<id>/redis-server.port
//! <dataDir>/<id>/redis-server.password
//! <logDir>/<id>/
//! <pidDir>/<id>.pid
//! ```

/// Plan label attached to lifecycle events.
pub const PLAN: &str = "shared-vm";

/// Merged configuration file inside the instance data directory.
pub const CONFIG_FILE_NAME: &str = "redis.conf";

/// Marker written at provisioning time.
pub const LOCK_FILE_NAME: &str = "lock";

/// Working directory of the redis-server process.
pub const DB_DIR_NAME: &str = "db";

/// Snapshot artifact written by `BGSAVE`, inside [`DB_DIR_NAME`].
pub const SNAPSHOT_FILE_NAME: &str = "dump.rdb";

/// Log file inside the instance log directory.
pub const LOG_FILE_NAME: &str = "redis-server.log";

/// Port sidecar.
pub const PORT_SIDECAR_NAME: &str = "redis-server.port";

/// Password sidecar.
pub const PASSWORD_SIDECAR_NAME: &str = "redis-server.password";

/// Extension of pid files in the pid directory.
pub const PID_FILE_EXTENSION: &str = "pid";

/// Prefix of the `syslog-ident` server name; the instance id is appended.
pub const SERVER_NAME_PREFIX: &str = "redis-server-";

/// Server name for an instance id.
pub fn server_name(instance_id: &str) -> String {
    format!("{}{}", SERVER_NAME_PREFIX, instance_id)
}
