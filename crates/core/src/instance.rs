//! Instance view
//!
//! An `Instance` is never cached. The repository rebuilds it from
//! `redis.conf` (and the password sidecar) every time it is read.

use serde::{Deserialize, Serialize};

/// One tenant's Redis deployment on the shared host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    /// Unique id; doubles as the directory and pid file key
    pub id: String,
    /// Address clients connect to
    pub host: String,
    /// Listening port
    pub port: u16,
    /// `requirepass` credential
    pub password: String,
}

impl Instance {
    /// Create an instance view
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        password: impl Into<String>,
    ) -> Self {
        Instance {
            id: id.into(),
            host: host.into(),
            port,
            password: password.into(),
        }
    }
}
