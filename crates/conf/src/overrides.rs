//! Recognized instance overrides
//!
//! Instance configuration is the default template plus a closed set of
//! overrides. Keys outside this table are rejected by [`Override::parse`];
//! template directives that are not overridden pass through untouched.

use std::path::PathBuf;

use crate::error::ConfError;

/// One recognized `redis.conf` override
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    /// `syslog-ident`, unique per instance
    ServerName(String),
    /// `dir`, the working directory holding `dump.rdb` and `appendonly.aof`
    WorkingDir(PathBuf),
    /// `logfile`
    LogFile(PathBuf),
    /// `pidfile`
    PidFile(PathBuf),
    /// `port`
    Port(u16),
    /// `requirepass`
    Password(String),
    /// `maxmemory`, e.g. `50mb` or `52428800`
    MaxMemory(String),
    /// `appendonly`
    AppendOnly(bool),
}

impl Override {
    /// Every key this table recognizes
    pub const KEYS: [&'static str; 8] = [
        "syslog-ident",
        "dir",
        "logfile",
        "pidfile",
        "port",
        "requirepass",
        "maxmemory",
        "appendonly",
    ];

    /// Directive name
    pub fn key(&self) -> &'static str {
        match self {
            Override::ServerName(_) => "syslog-ident",
            Override::WorkingDir(_) => "dir",
            Override::LogFile(_) => "logfile",
            Override::PidFile(_) => "pidfile",
            Override::Port(_) => "port",
            Override::Password(_) => "requirepass",
            Override::MaxMemory(_) => "maxmemory",
            Override::AppendOnly(_) => "appendonly",
        }
    }

    /// Directive argument
    pub fn value(&self) -> String {
        match self {
            Override::ServerName(s) | Override::Password(s) | Override::MaxMemory(s) => s.clone(),
            Override::WorkingDir(p) | Override::LogFile(p) | Override::PidFile(p) => {
                p.to_string_lossy().into_owned()
            }
            Override::Port(port) => port.to_string(),
            Override::AppendOnly(true) => "yes".to_string(),
            Override::AppendOnly(false) => "no".to_string(),
        }
    }

    /// Build an override from a key/value pair.
    ///
    /// Surrounding whitespace in `value` is ignored, so sidecar file contents
    /// with a trailing newline parse cleanly.
    pub fn parse(key: &str, value: &str) -> Result<Self, ConfError> {
        let value = value.trim();
        let invalid = || ConfError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key.to_ascii_lowercase().as_str() {
            "syslog-ident" => Ok(Override::ServerName(value.to_string())),
            "dir" => Ok(Override::WorkingDir(PathBuf::from(value))),
            "logfile" => Ok(Override::LogFile(PathBuf::from(value))),
            "pidfile" => Ok(Override::PidFile(PathBuf::from(value))),
            "port" => value.parse().map(Override::Port).map_err(|_| invalid()),
            "requirepass" => Ok(Override::Password(value.to_string())),
            "maxmemory" => {
                if is_memory_size(value) {
                    Ok(Override::MaxMemory(value.to_string()))
                } else {
                    Err(invalid())
                }
            }
            "appendonly" => match value {
                "yes" => Ok(Override::AppendOnly(true)),
                "no" => Ok(Override::AppendOnly(false)),
                _ => Err(invalid()),
            },
            _ => Err(ConfError::UnknownKey(key.to_string())),
        }
    }
}

/// `<digits>[k|kb|m|mb|g|gb]`, unit case-insensitive
fn is_memory_size(value: &str) -> bool {
    let digits = value.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    matches!(
        value[digits..].to_ascii_lowercase().as_str(),
        "" | "k" | "kb" | "m" | "mb" | "g" | "gb"
    )
}
