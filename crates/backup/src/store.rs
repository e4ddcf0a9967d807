//! Object storage abstraction
//!
//! The pipeline only needs two calls: get-or-create a bucket, and upload
//! bytes to a path inside it. `get_or_create` is idempotent, so re-running a
//! failed backup never special-cases an existing bucket.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use sharedvm_core::{Error, Result};

/// Object storage service
pub trait ObjectStore {
    /// Bucket handle produced by this store
    type Bucket: Bucket;

    /// Return the named bucket, creating it if absent
    fn get_or_create(&self, bucket_name: &str) -> Result<Self::Bucket>;
}

/// A named container of uploaded artifacts
pub trait Bucket {
    /// Bucket name
    fn name(&self) -> &str;

    /// Write `data` at `remote_path`, replacing any existing object
    fn upload(&self, data: &[u8], remote_path: &str) -> Result<()>;
}

/// Object store keeping each bucket as a directory under a root
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalObjectStore { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ObjectStore for LocalObjectStore {
    type Bucket = LocalBucket;

    fn get_or_create(&self, bucket_name: &str) -> Result<LocalBucket> {
        let provision_error = |reason: String| Error::BucketProvision {
            bucket: bucket_name.to_string(),
            reason,
        };

        let relative = safe_relative(bucket_name)
            .filter(|p| p.components().count() == 1)
            .ok_or_else(|| provision_error("invalid bucket name".to_string()))?;
        let dir = self.root.join(relative);
        fs::create_dir_all(&dir)
            .map_err(|e| provision_error(format!("{}: {}", dir.display(), e)))?;

        Ok(LocalBucket {
            name: bucket_name.to_string(),
            dir,
        })
    }
}

/// Directory-backed bucket
#[derive(Debug, Clone)]
pub struct LocalBucket {
    name: String,
    dir: PathBuf,
}

impl LocalBucket {
    /// Filesystem location of an object
    pub fn object_path(&self, remote_path: &str) -> Option<PathBuf> {
        safe_relative(remote_path).map(|p| self.dir.join(p))
    }
}

impl Bucket for LocalBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload(&self, data: &[u8], remote_path: &str) -> Result<()> {
        let upload_error = |reason: String| Error::Upload {
            remote_path: remote_path.to_string(),
            reason,
        };

        let path = self
            .object_path(remote_path)
            .ok_or_else(|| upload_error("invalid object path".to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| upload_error(e.to_string()))?;
        }

        // Write-then-rename so readers never see a partial object
        let temp_path = upload_temp_path(&path);
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            upload_error(e.to_string())
        })
    }
}

/// Hidden sibling named after the full object file name
fn upload_temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.upload.tmp", name))
}

/// `remote` as a relative path with only normal components
fn safe_relative(remote: &str) -> Option<PathBuf> {
    let path = Path::new(remote.trim_start_matches('/'));
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}
