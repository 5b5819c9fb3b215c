//! File sink with optional size-based rotation
//!
//! Lines are appended to the file. When rotation is enabled and the file grows
//! past `max_size` bytes, `app.log` becomes `app.log.1`, the previous
//! `app.log.1` becomes `app.log.2`, and so on up to `backlog` backups; the
//! oldest backup is discarded.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::flush::{FlushPolicy, FlushTracker};
use super::format::render_line;
use super::traits::{Sink, SinkError, SinkResult};
use crate::config::{ConfigError, ConfigResult};
use crate::types::Record;

/// Upper bound for the number of backup files
pub const BACKLOG_MAX: usize = 1000;

/// Rotation settings for a [`FileSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rotation {
    /// Rotate once the file exceeds this many bytes; 0 disables rotation
    pub max_size: u64,
    /// Number of numbered backups kept
    pub backlog: usize,
}

impl Rotation {
    pub fn new(max_size: u64, backlog: usize) -> ConfigResult<Self> {
        let rotation = Self { max_size, backlog };
        rotation.validate()?;
        Ok(rotation)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 {
            return Ok(());
        }
        if self.backlog == 0 {
            return Err(ConfigError::InvalidSink(
                "rotating file sink needs a backlog of at least 1".to_string(),
            ));
        }
        if self.backlog > BACKLOG_MAX {
            return Err(ConfigError::InvalidSink(format!(
                "backlog {} too big, maximum is {}",
                self.backlog, BACKLOG_MAX
            )));
        }
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.max_size > 0 && self.backlog > 0
    }
}

/// Appends rendered lines to a file
#[derive(Debug)]
pub struct FileSink {
    name: String,
    path: PathBuf,
    rotation: Rotation,
    /// `None` after a failed reopen; the next write tries again
    file: Option<BufWriter<File>>,
    size: u64,
    tracker: FlushTracker,
    closed: bool,
}

impl FileSink {
    /// Open (or create) `path` for appending
    pub fn open(path: impl Into<PathBuf>, policy: FlushPolicy) -> SinkResult<Self> {
        Self::with_rotation(path, policy, Rotation::default())
    }

    /// Open with rotation enabled
    pub fn with_rotation(
        path: impl Into<PathBuf>,
        policy: FlushPolicy,
        rotation: Rotation,
    ) -> SinkResult<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            name: format!("file:{}", path.display()),
            path,
            rotation,
            file: Some(BufWriter::new(file)),
            size,
            tracker: FlushTracker::new(policy),
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of backup number `n` (1 = most recent)
    pub fn backup_path(&self, n: usize) -> PathBuf {
        backup_path(&self.path, n)
    }

    fn reopen(&mut self) -> SinkResult<()> {
        let file = open_append(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(BufWriter::new(file));
        Ok(())
    }
}

/// `app.log.(n-1)` -> `app.log.n` down to `app.log` -> `app.log.1`
fn shift_backups(path: &Path, backlog: usize) -> std::io::Result<()> {
    let oldest = backup_path(path, backlog);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..backlog).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            fs::rename(&from, backup_path(path, n + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &Record<'_>) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.file.is_none() {
            self.reopen()?;
        }
        let file = self.file.as_mut().ok_or(SinkError::Closed)?;
        let mut line = render_line(record);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        self.size += line.len() as u64;
        if self.tracker.record_write() {
            file.flush()?;
            self.tracker.flushed();
        }
        if self.rotation.enabled() && self.size > self.rotation.max_size {
            self.rotate()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
            self.tracker.flushed();
        }
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        let result = self.flush();
        self.file = None;
        self.closed = true;
        result
    }

    /// Rotate now, regardless of size
    ///
    /// The current path is reopened even when moving the backups fails, so
    /// the sink keeps appending and a later rotation can retry.
    fn rotate(&mut self) -> SinkResult<()> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        self.file = None;

        let shifted = shift_backups(&self.path, self.rotation.backlog.max(1));
        let reopened = self.reopen();
        self.tracker.flushed();
        shifted?;
        reopened
    }

}
