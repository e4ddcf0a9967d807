//! Config merger errors

use std::path::PathBuf;

/// Errors from loading, parsing or overriding a `redis.conf`
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    /// File could not be read or written
    #[error("{op} {}: {source}", path.display())]
    Io {
        /// "read" or "write"
        op: &'static str,
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Syntax error
    #[error("line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },

    /// Override key outside the recognized set
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Value unusable for its key
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Directive name
        key: String,
        /// Offending value
        value: String,
    },
}
