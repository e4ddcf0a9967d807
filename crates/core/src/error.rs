//! Error types for sharedvm
//!
//! Single-instance operations fail fast with one of these. Bulk operations
//! (enumeration, count) collect them into a side list instead, wrapping each
//! per-entry failure in [`Error::Scan`].
//!
//! A missing snapshot artifact is not an error; the backup pipeline reports it
//! as a skipped outcome.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for sharedvm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for repository and backup operations
#[derive(Debug, Error)]
pub enum Error {
    /// Instance configuration file is absent
    #[error("instance {id} not found: {} does not exist", path.display())]
    NotFound {
        /// Instance id
        id: String,
        /// Configuration path that was checked
        path: PathBuf,
    },

    /// Directory or file creation refused by the filesystem
    #[error("permission denied during {op} on {}: {source}", path.display())]
    PermissionDenied {
        /// Operation name
        op: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Any other filesystem failure
    #[error("I/O error during {op} on {}: {source}", path.display())]
    Io {
        /// Operation name
        op: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Default template or instance configuration failed to parse
    #[error("invalid configuration {}: {reason}", path.display())]
    InvalidConfiguration {
        /// Configuration file path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Pid file content is not a decimal process id
    #[error("invalid pid file {}: {reason}", path.display())]
    PidParse {
        /// Pid file path
        path: PathBuf,
        /// Parse failure
        reason: String,
    },

    /// Could not reach or authenticate against the data store
    #[error("connection to {addr} failed: {reason}")]
    Connection {
        /// host:port
        addr: String,
        /// Failure description
        reason: String,
    },

    /// Data store did not acknowledge persistence in time
    #[error("snapshot did not complete within {timeout_secs}s")]
    SnapshotTimeout {
        /// Configured timeout
        timeout_secs: u64,
    },

    /// Data store rejected a command
    #[error("snapshot command {command} rejected: {reason}")]
    SnapshotCommand {
        /// Command name
        command: &'static str,
        /// Error reply or protocol failure
        reason: String,
    },

    /// Bucket lookup or creation failed
    #[error("could not provision bucket {bucket}: {reason}")]
    BucketProvision {
        /// Bucket name
        bucket: String,
        /// Failure description
        reason: String,
    },

    /// Object storage write failed
    #[error("upload to {remote_path} failed: {reason}")]
    Upload {
        /// Destination object path
        remote_path: String,
        /// Failure description
        reason: String,
    },

    /// One enumeration entry could not be read
    #[error("Error getting instance details for instance ID: {id}: {source}")]
    Scan {
        /// Instance id of the failing entry
        id: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an IO error with operation and path context.
    ///
    /// `PermissionDenied` IO errors become [`Error::PermissionDenied`].
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Error::PermissionDenied { op, path, source }
        } else {
            Error::Io { op, path, source }
        }
    }

    /// True when the error signals absence, including IO `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Error::Scan { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The IO error kind this error corresponds to.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Error::NotFound { .. } => io::ErrorKind::NotFound,
            Error::PermissionDenied { .. } => io::ErrorKind::PermissionDenied,
            Error::Io { source, .. } => source.kind(),
            Error::InvalidConfiguration { .. } | Error::PidParse { .. } => {
                io::ErrorKind::InvalidData
            }
            Error::SnapshotTimeout { .. } => io::ErrorKind::TimedOut,
            Error::Scan { source, .. } => source.kind(),
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(e.kind(), e)
    }
}
