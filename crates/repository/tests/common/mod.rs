//! Shared fixtures for repository integration tests.
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sharedvm_core::{Instance, ServiceConfig};
use sharedvm_repository::LocalRepository;
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

pub const DEFAULT_TEMPLATE: &str = "daemonize yes\n";

// ============================================================================
// Log capture
// ============================================================================

/// In-memory sink for a `tracing-subscriber` fmt layer.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a capturing subscriber on the current thread.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Assert `needles` appear in order.
    pub fn assert_in_order(&self, needles: &[&str]) {
        let text = self.contents();
        let mut rest = text.as_str();
        for needle in needles {
            match rest.find(needle) {
                Some(pos) => rest = &rest[pos + needle.len()..],
                None => panic!("expected {:?} in log output:\n{}", needle, text),
            }
        }
    }
}

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(self.buf.clone())
    }
}

// ============================================================================
// TestPool - repository over temporary roots
// ============================================================================

pub struct TestPool {
    pub dir: TempDir,
    pub repo: LocalRepository,
}

impl TestPool {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let template = root.join("default_config");
        std::fs::write(&template, DEFAULT_TEMPLATE).unwrap();
        for sub in ["data", "log", "pidfiles"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }

        let config = ServiceConfig::new(
            template,
            root.join("data"),
            root.join("log"),
            root.join("pidfiles"),
        );
        TestPool {
            repo: LocalRepository::new(config),
            dir,
        }
    }

    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn log_root(&self) -> PathBuf {
        self.dir.path().join("log")
    }

    pub fn pid_root(&self) -> PathBuf {
        self.dir.path().join("pidfiles")
    }

    /// Replace the default template every later write merges from.
    pub fn set_template(&self, contents: &str) {
        std::fs::write(&self.repo.config().default_config_path, contents).unwrap();
    }

    /// Provision a fresh instance with a random id.
    pub fn provision(&self) -> Instance {
        self.provision_id(&new_id())
    }

    pub fn provision_id(&self, id: &str) -> Instance {
        let instance = Instance::new(id, "127.0.0.1", next_port(), new_id());
        self.repo.setup(&instance).unwrap();
        instance
    }

    /// The ensure-directories + write-config path used for rebinds.
    pub fn rewrite(&self, instance: &Instance) {
        self.repo.ensure_directories_exist(instance).unwrap();
        self.repo.write_config_file(instance).unwrap();
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn next_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT: AtomicU16 = AtomicU16::new(7000);
    PORT.fetch_add(1, Ordering::Relaxed)
}

pub fn read(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
