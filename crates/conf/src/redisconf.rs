//! `redis.conf` parser and serializer
//!
//! Each line is either a directive (`name arg arg ...`) or raw text (blank
//! lines and `#` comments). Raw lines and directive order survive a
//! parse/serialize cycle, so a template keeps its comments after merging.
//!
//! Arguments follow redis-server's own splitting rules:
//! - whitespace separates arguments
//! - `"..."` supports `\n \r \t \b \a \\ \" \xHH` escapes
//! - `'...'` supports only `\'`
//! - a closing quote must be followed by whitespace or end of line
//! - every directive takes at least one argument
//!
//! # Saving
//!
//! [`RedisConf::save`] always rewrites the whole file:
//! 1. Write to a temporary sibling (`.<name>.tmp`)
//! 2. fsync the temporary file
//! 3. Rename over the destination
//!
//! A crash mid-write leaves the previous file or the new one, never a prefix.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfError;
use crate::overrides::Override;

/// Port redis-server listens on when `port` is not set.
pub const DEFAULT_PORT: u16 = 6379;

/// A single `name arg...` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    name: String,
    args: Vec<String>,
}

impl Directive {
    /// Create a directive
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Directive {
            name: name.into(),
            args,
        }
    }

    /// Directive name as written
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments, unquoted
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn is(&self, key: &str) -> bool {
        self.name.eq_ignore_ascii_case(key)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Raw(String),
    Directive(Directive),
}

/// Parsed `redis.conf`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedisConf {
    lines: Vec<Line>,
}

impl RedisConf {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self, ConfError> {
        let mut lines = Vec::new();
        for (idx, text) in content.lines().enumerate() {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                lines.push(Line::Raw(text.to_string()));
                continue;
            }

            let mut args = split_args(trimmed, idx + 1)?;
            let name = args.remove(0);
            if name.is_empty() {
                return Err(parse_error(idx + 1, "empty directive name"));
            }
            if args.is_empty() {
                return Err(parse_error(idx + 1, "missing argument"));
            }
            lines.push(Line::Directive(Directive { name, args }));
        }
        Ok(RedisConf { lines })
    }

    /// Read and parse a file
    pub fn load(path: &Path) -> Result<Self, ConfError> {
        let content = fs::read_to_string(path).map_err(|e| ConfError::Io {
            op: "read",
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Replace `path` with this configuration
    pub fn save(&self, path: &Path) -> Result<(), ConfError> {
        let io_err = |source: std::io::Error| ConfError::Io {
            op: "write",
            path: path.to_path_buf(),
            source,
        };

        let temp_path = temp_path_for(path);
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(self.to_string().as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            io_err(e)
        })
    }

    /// First directive named `key` (case-insensitive)
    pub fn directive(&self, key: &str) -> Option<&Directive> {
        self.directives().find(|d| d.is(key))
    }

    /// Arguments of the first `key` directive joined by single spaces
    pub fn get(&self, key: &str) -> Option<String> {
        self.directive(key).map(|d| d.args.join(" "))
    }

    /// Every directive named `key`, for repeatable directives like `save`
    pub fn get_all(&self, key: &str) -> Vec<&Directive> {
        self.directives().filter(|d| d.is(key)).collect()
    }

    /// Iterate over directives in file order
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.lines.iter().filter_map(|line| match line {
            Line::Directive(d) => Some(d),
            Line::Raw(_) => None,
        })
    }

    /// Set `key` to a single argument
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.set_args(key, vec![value.into()]);
    }

    /// Set `key` to `args`.
    ///
    /// The first existing occurrence is rewritten in place and later
    /// occurrences are dropped; otherwise the directive is appended.
    pub fn set_args(&mut self, key: &str, args: Vec<String>) {
        let mut args = Some(args);
        self.lines.retain_mut(|line| match line {
            Line::Directive(d) if d.is(key) => match args.take() {
                Some(new_args) => {
                    d.args = new_args;
                    true
                }
                None => false,
            },
            _ => true,
        });
        if let Some(args) = args {
            self.lines.push(Line::Directive(Directive {
                name: key.to_string(),
                args,
            }));
        }
    }

    /// Remove every `key` directive; returns whether any existed
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, Line::Directive(d) if d.is(key)));
        before != self.lines.len()
    }

    /// Apply a recognized override
    pub fn apply(&mut self, o: &Override) {
        self.set(o.key(), o.value());
    }

    /// Listening port, [`DEFAULT_PORT`] when unset
    pub fn port(&self) -> Result<u16, ConfError> {
        match self.directive("port").and_then(|d| d.args.first()) {
            None => Ok(DEFAULT_PORT),
            Some(v) => v.parse().map_err(|_| ConfError::InvalidValue {
                key: "port".to_string(),
                value: v.clone(),
            }),
        }
    }

    /// `requirepass` value, if any
    pub fn password(&self) -> Option<&str> {
        self.directive("requirepass")
            .and_then(|d| d.args.first())
            .map(String::as_str)
    }
}

impl fmt::Display for RedisConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Raw(text) => writeln!(f, "{}", text)?,
                Line::Directive(d) => writeln!(f, "{}", d)?,
            }
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

fn parse_error(line: usize, reason: &str) -> ConfError {
    ConfError::Parse {
        line,
        reason: reason.to_string(),
    }
}

fn split_args(text: &str, line: usize) -> Result<Vec<String>, ConfError> {
    let mut args = Vec::new();
    let mut chars = text.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut current = String::new();
        match first {
            '"' => {
                chars.next();
                loop {
                    match chars.next() {
                        None => return Err(parse_error(line, "unbalanced quotes")),
                        Some('\\') => match chars.next() {
                            None => return Err(parse_error(line, "unbalanced quotes")),
                            Some('n') => current.push('\n'),
                            Some('r') => current.push('\r'),
                            Some('t') => current.push('\t'),
                            Some('b') => current.push('\u{8}'),
                            Some('a') => current.push('\u{7}'),
                            Some('x') => {
                                let mut lookahead = chars.clone();
                                let hi = lookahead.next().and_then(|c| c.to_digit(16));
                                let lo = lookahead.next().and_then(|c| c.to_digit(16));
                                match (hi, lo) {
                                    (Some(hi), Some(lo)) => {
                                        chars = lookahead;
                                        current.push(char::from((hi * 16 + lo) as u8));
                                    }
                                    _ => current.push('x'),
                                }
                            }
                            Some(c) => current.push(c),
                        },
                        Some('"') => {
                            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                                return Err(parse_error(
                                    line,
                                    "closing quote must be followed by a space",
                                ));
                            }
                            break;
                        }
                        Some(c) => current.push(c),
                    }
                }
            }
            '\'' => {
                chars.next();
                loop {
                    match chars.next() {
                        None => return Err(parse_error(line, "unbalanced quotes")),
                        Some('\\') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            current.push('\'');
                        }
                        Some('\'') => {
                            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                                return Err(parse_error(
                                    line,
                                    "closing quote must be followed by a space",
                                ));
                            }
                            break;
                        }
                        Some(c) => current.push(c),
                    }
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    current.push(c);
                    chars.next();
                }
            }
        }
        args.push(current);
    }

    Ok(args)
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_graphic() && c != '"' && c != '\'' && c != '\\');
    if plain {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
