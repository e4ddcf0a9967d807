//! Instance Repository for sharedvm
//!
//! The filesystem is the only source of truth. Every query re-reads it;
//! nothing is cached between calls.
//!
//! - [`InstancePaths`]: pure path composition for one pool
//! - [`LocalRepository`]: create, read, enumerate and delete instances
//!
//! Operations on different instance ids touch disjoint subtrees and may run
//! concurrently. Operations on the same id are not serialized here; callers
//! own per-id ordering.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod local;
pub mod paths;
mod scan;

pub use local::LocalRepository;
pub use paths::InstancePaths;
