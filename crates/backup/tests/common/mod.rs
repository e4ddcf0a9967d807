//! Shared fixtures for backup integration tests.
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use sharedvm_backup::{Bucket, Connector, ObjectStore, SnapshotClient};
use sharedvm_conf::RedisConf;
use sharedvm_core::{BackupConfig, Error, Result};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

// ============================================================================
// Log capture
// ============================================================================

/// In-memory sink for a `tracing-subscriber` fmt layer.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
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
// Call journal shared by the fakes
// ============================================================================

/// Ordered record of calls made against the fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

// ============================================================================
// Fake object store
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeStore {
    pub journal: Journal,
    pub fail_bucket: bool,
    pub fail_upload: bool,
    pub objects: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
}

pub struct FakeBucket {
    name: String,
    store: FakeStore,
}

impl ObjectStore for FakeStore {
    type Bucket = FakeBucket;

    fn get_or_create(&self, bucket_name: &str) -> Result<FakeBucket> {
        self.journal.push(format!("bucket {}", bucket_name));
        if self.fail_bucket {
            return Err(Error::BucketProvision {
                bucket: bucket_name.to_string(),
                reason: "access denied".to_string(),
            });
        }
        Ok(FakeBucket {
            name: bucket_name.to_string(),
            store: self.clone(),
        })
    }
}

impl Bucket for FakeBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload(&self, data: &[u8], remote_path: &str) -> Result<()> {
        self.store.journal.push(format!("upload {}", remote_path));
        if self.store.fail_upload {
            return Err(Error::Upload {
                remote_path: remote_path.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.store
            .objects
            .lock()
            .push((self.name.clone(), remote_path.to_string(), data.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Fake data-store connector
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub journal: Journal,
    pub fail_connect: bool,
    pub fail_snapshot: bool,
    /// Written to the artifact path when the snapshot runs
    pub produce: Option<(PathBuf, Vec<u8>)>,
}

pub struct FakeClient {
    connector: FakeConnector,
}

impl Connector for FakeConnector {
    type Client = FakeClient;

    fn connect(&self, host: &str, conf: &RedisConf) -> Result<FakeClient> {
        let port = conf.port().unwrap();
        self.journal.push(format!(
            "connect {}:{} {}",
            host,
            port,
            conf.password().unwrap_or("-")
        ));
        if self.fail_connect {
            return Err(Error::Connection {
                addr: format!("{}:{}", host, port),
                reason: "connection refused".to_string(),
            });
        }
        Ok(FakeClient {
            connector: self.clone(),
        })
    }
}

impl SnapshotClient for FakeClient {
    fn create_snapshot(&mut self, timeout_secs: u64) -> Result<()> {
        self.connector
            .journal
            .push(format!("snapshot {}", timeout_secs));
        if self.connector.fail_snapshot {
            return Err(Error::SnapshotTimeout { timeout_secs });
        }
        if let Some((path, data)) = &self.connector.produce {
            std::fs::write(path, data).unwrap();
        }
        Ok(())
    }
}

// ============================================================================
// Instance fixture
// ============================================================================

pub fn backup_config() -> BackupConfig {
    BackupConfig {
        endpoint_url: "http://127.0.0.1:9".to_string(),
        s3_region: "us-east-1".to_string(),
        access_key_id: "AKID".to_string(),
        secret_access_key: "secret".to_string(),
        bucket_name: "redis-backups".to_string(),
        path: "shared-vm".to_string(),
        bg_save_timeout_seconds: 10,
    }
}

/// An instance directory with config, sidecars and an empty `db/`.
pub struct InstanceDir {
    pub dir: TempDir,
    pub id: String,
}

impl InstanceDir {
    pub fn new(port: u16, password: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let id = uuid_like();
        let path = dir.path().join(&id);
        std::fs::create_dir_all(path.join("db")).unwrap();
        std::fs::write(
            path.join("redis.conf"),
            "daemonize yes\nport 6379\nrequirepass stale\n",
        )
        .unwrap();
        std::fs::write(path.join("redis-server.port"), format!("{}\n", port)).unwrap();
        std::fs::write(path.join("redis-server.password"), password).unwrap();
        InstanceDir { dir, id }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join(&self.id)
    }

    pub fn artifact(&self) -> PathBuf {
        self.path().join("db").join("dump.rdb")
    }
}

fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);
    format!("instance-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

// ============================================================================
// Fake redis-server speaking just enough RESP
// ============================================================================

/// Scripted behavior of [`spawn_fake_redis`].
#[derive(Clone)]
pub struct FakeRedis {
    pub password: Option<String>,
    /// `INFO persistence` polls reporting a save in progress before it ends
    pub busy_polls: usize,
    pub last_status: &'static str,
    /// Never finish the save
    pub stuck: bool,
    pub bgsave_error: Option<&'static str>,
    /// Written when the save finishes
    pub artifact: Option<(PathBuf, Vec<u8>)>,
}

impl Default for FakeRedis {
    fn default() -> Self {
        FakeRedis {
            password: None,
            busy_polls: 2,
            last_status: "ok",
            stuck: false,
            bgsave_error: None,
            artifact: None,
        }
    }
}

/// Serve one connection on an ephemeral port; returns the port and the
/// commands received.
pub fn spawn_fake_redis(script: FakeRedis) -> (u16, Journal) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let journal = Journal::default();
    let seen = journal.clone();

    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            let _ = serve(stream, &script, &seen);
        }
    });
    (port, journal)
}

fn serve(stream: TcpStream, script: &FakeRedis, journal: &Journal) -> io::Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut polls = 0usize;

    loop {
        let args = match read_command(&mut reader)? {
            Some(args) => args,
            None => return Ok(()),
        };
        journal.push(args.join(" "));

        let reply = match args[0].to_ascii_uppercase().as_str() {
            "AUTH" => match &script.password {
                Some(p) if args.get(1) == Some(p) => "+OK\r\n".to_string(),
                _ => "-WRONGPASS invalid username-password pair\r\n".to_string(),
            },
            "PING" => "+PONG\r\n".to_string(),
            "BGSAVE" => match script.bgsave_error {
                Some(e) => format!("-{}\r\n", e),
                None => "+Background saving started\r\n".to_string(),
            },
            "INFO" => {
                let in_progress = script.stuck || polls < script.busy_polls;
                polls += 1;
                if !in_progress {
                    if let Some((path, data)) = &script.artifact {
                        std::fs::write(path, data)?;
                    }
                }
                let body = format!(
                    "# Persistence\r\nloading:0\r\nrdb_bgsave_in_progress:{}\r\nrdb_last_bgsave_status:{}\r\n",
                    u8::from(in_progress),
                    script.last_status
                );
                format!("${}\r\n{}\r\n", body.len(), body)
            }
            _ => "-ERR unknown command\r\n".to_string(),
        };
        writer.write_all(reply.as_bytes())?;
    }
}

fn read_command<R: BufRead>(reader: &mut R) -> io::Result<Option<Vec<String>>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let count: usize = line.trim_start_matches('*').trim().parse().unwrap();
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line)?;
        let len: usize = line.trim_start_matches('$').trim().parse().unwrap();
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf)?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).unwrap());
    }
    Ok(Some(args))
}

pub fn conf_for(port: u16, password: Option<&str>) -> RedisConf {
    let mut text = format!("port {}\n", port);
    if let Some(p) = password {
        text.push_str(&format!("requirepass {}\n", p));
    }
    RedisConf::parse(&text).unwrap()
}

pub fn read(path: impl AsRef<Path>) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
