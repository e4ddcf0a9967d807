//! Lifecycle Tests
//!
//! Drive instances through the public facade end to end:
//! - provisioning, rebind and lookup from a TOML-configured host
//! - backup of a provisioned instance into a local object store
//! - deprovisioning and pool enumeration

#[path = "../common/mod.rs"]
mod common;
