//! Config Merger for sharedvm
//!
//! Loads a base `redis.conf` template, overlays a closed set of instance
//! overrides, and serializes the result back to `redis.conf` syntax.
//!
//! - [`RedisConf`]: order-preserving parser and serializer
//! - [`Override`]: the recognized override keys
//! - [`merge`]: template + overrides in one call

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod overrides;
pub mod redisconf;

pub use error::ConfError;
pub use overrides::Override;
pub use redisconf::{Directive, RedisConf, DEFAULT_PORT};

use std::path::Path;

/// Load `template` and apply `overrides` in order.
pub fn merge(template: &Path, overrides: &[Override]) -> Result<RedisConf, ConfError> {
    let mut conf = RedisConf::load(template)?;
    for o in overrides {
        conf.apply(o);
    }
    Ok(conf)
}
