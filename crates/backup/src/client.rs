//! Data-store control client
//!
//! A minimal RESP client that authenticates and drives `BGSAVE`. Snapshot
//! completion is detected by polling `INFO persistence` until
//! `rdb_bgsave_in_progress` drops to 0, then checking
//! `rdb_last_bgsave_status`.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use sharedvm_conf::RedisConf;
use sharedvm_core::{Error, Result};
use tracing::debug;

/// Socket timeout applied to every command round trip.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between `INFO persistence` polls while a snapshot runs.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Something that can take a synchronous snapshot
pub trait SnapshotClient {
    /// Persist the dataset, waiting at most `timeout_secs`
    fn create_snapshot(&mut self, timeout_secs: u64) -> Result<()>;
}

/// Builds snapshot clients from an instance configuration
pub trait Connector {
    /// Client type produced
    type Client: SnapshotClient;

    /// Connect to `host` using the port and password in `conf`
    fn connect(&self, host: &str, conf: &RedisConf) -> Result<Self::Client>;
}

/// Connector producing [`RedisControlClient`]s over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Client = RedisControlClient;

    fn connect(&self, host: &str, conf: &RedisConf) -> Result<RedisControlClient> {
        RedisControlClient::connect(host, conf)
    }
}

/// RESP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`
    Simple(String),
    /// `-ERR ...`
    Error(String),
    /// `:42`
    Integer(i64),
    /// `$n` bulk string; `None` for `$-1`
    Bulk(Option<Vec<u8>>),
    /// `*n` array; `None` for `*-1`
    Array(Option<Vec<Reply>>),
}

/// RESP client for one redis-server
#[derive(Debug)]
pub struct RedisControlClient {
    addr: String,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl RedisControlClient {
    /// Connect and authenticate with `requirepass` when set
    pub fn connect(host: &str, conf: &RedisConf) -> Result<Self> {
        let port = conf.port().map_err(|e| Error::Connection {
            addr: host.to_string(),
            reason: e.to_string(),
        })?;
        let addr = format!("{}:{}", host, port);
        let connection_error = |reason: String| Error::Connection {
            addr: addr.clone(),
            reason,
        };

        let stream = TcpStream::connect((host, port)).map_err(|e| connection_error(e.to_string()))?;
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
            .map_err(|e| connection_error(e.to_string()))?;
        let reader_stream = stream
            .try_clone()
            .map_err(|e| connection_error(e.to_string()))?;

        let mut client = RedisControlClient {
            addr: addr.clone(),
            stream,
            reader: BufReader::new(reader_stream),
        };

        if let Some(password) = conf.password().filter(|p| !p.is_empty()) {
            match client.command(&["AUTH", password]) {
                Ok(Reply::Simple(_)) => {}
                Ok(Reply::Error(e)) => return Err(connection_error(format!("AUTH rejected: {}", e))),
                Ok(other) => {
                    return Err(connection_error(format!("unexpected AUTH reply: {:?}", other)))
                }
                Err(e) => return Err(connection_error(e.to_string())),
            }
        }

        debug!(target: "sharedvm::backup", addr = %client.addr, "Connected to redis-server");
        Ok(client)
    }

    /// Server address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send a command and read one reply
    pub fn command(&mut self, args: &[&str]) -> std::io::Result<Reply> {
        self.stream.write_all(&encode_command(args))?;
        self.stream.flush()?;
        read_reply(&mut self.reader)
    }

    /// `PING`
    pub fn ping(&mut self) -> Result<()> {
        match self.command(&["PING"]) {
            Ok(Reply::Simple(s)) if s == "PONG" => Ok(()),
            Ok(other) => Err(command_error("PING", format!("{:?}", other))),
            Err(e) => Err(command_error("PING", e.to_string())),
        }
    }

    fn persistence_info(&mut self) -> Result<PersistenceInfo> {
        match self.command(&["INFO", "persistence"]) {
            Ok(Reply::Bulk(Some(body))) => Ok(PersistenceInfo::parse(&String::from_utf8_lossy(&body))),
            Ok(Reply::Error(e)) => Err(command_error("INFO", e)),
            Ok(other) => Err(command_error("INFO", format!("unexpected reply: {:?}", other))),
            Err(e) => Err(command_error("INFO", e.to_string())),
        }
    }
}

impl SnapshotClient for RedisControlClient {
    fn create_snapshot(&mut self, timeout_secs: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        match self.command(&["BGSAVE"]) {
            Ok(Reply::Simple(_)) => {}
            Ok(Reply::Error(e)) => return Err(command_error("BGSAVE", e)),
            Ok(other) => {
                return Err(command_error("BGSAVE", format!("unexpected reply: {:?}", other)))
            }
            Err(e) => return Err(command_error("BGSAVE", e.to_string())),
        }

        loop {
            let info = self.persistence_info()?;
            if !info.bgsave_in_progress {
                return match info.last_bgsave_status.as_deref() {
                    None | Some("ok") => Ok(()),
                    Some(status) => Err(command_error(
                        "BGSAVE",
                        format!("rdb_last_bgsave_status:{}", status),
                    )),
                };
            }
            if Instant::now() >= deadline {
                return Err(Error::SnapshotTimeout { timeout_secs });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn command_error(command: &'static str, reason: String) -> Error {
    Error::SnapshotCommand { command, reason }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PersistenceInfo {
    bgsave_in_progress: bool,
    last_bgsave_status: Option<String>,
}

impl PersistenceInfo {
    fn parse(body: &str) -> Self {
        let mut info = PersistenceInfo::default();
        for line in body.lines() {
            match line.trim().split_once(':') {
                Some(("rdb_bgsave_in_progress", v)) => info.bgsave_in_progress = v == "1",
                Some(("rdb_last_bgsave_status", v)) => {
                    info.last_bgsave_status = Some(v.to_string())
                }
                _ => {}
            }
        }
        info
    }
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Read one RESP reply
pub fn read_reply<R: BufRead>(reader: &mut R) -> std::io::Result<Reply> {
    let line = read_line(reader)?;
    let mut chars = line.chars();
    let kind = chars.next().unwrap_or_default();
    let rest = chars.as_str();
    match kind {
        '+' => Ok(Reply::Simple(rest.to_string())),
        '-' => Ok(Reply::Error(rest.to_string())),
        ':' => parse_int(rest).map(Reply::Integer),
        '$' => {
            let len = parse_int(rest)?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            let mut buf = vec![0u8; len as usize + 2];
            reader.read_exact(&mut buf)?;
            buf.truncate(len as usize);
            Ok(Reply::Bulk(Some(buf)))
        }
        '*' => {
            let len = parse_int(rest)?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let items = (0..len)
                .map(|_| read_reply(reader))
                .collect::<std::io::Result<Vec<_>>>()?;
            Ok(Reply::Array(Some(items)))
        }
        other => Err(protocol_error(format!("unknown reply type {:?}", other))),
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> std::io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed",
        ));
    }
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        return Err(protocol_error("empty reply line".to_string()));
    }
    Ok(line)
}

fn parse_int(text: &str) -> std::io::Result<i64> {
    text.parse()
        .map_err(|_| protocol_error(format!("invalid integer {:?}", text)))
}

fn protocol_error(msg: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
}
