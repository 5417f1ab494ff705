use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use super::{Event, EventLog, EventQuery};
use crate::error::{BumpersError, Result};

/// File-backed event log (JSONL)
///
/// One event per line. Appends are serialized through a mutex; queries
/// re-read the file, so another process can tail the same log.
#[derive(Debug)]
pub struct FileEventLog {
    path: PathBuf,
    /// `None` when opened read-only
    writer: Option<Mutex<File>>,
}

impl FileEventLog {
    /// Open (or create) the log at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BumpersError::IoError {
                message: format!("Failed to create log directory: {}", e),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BumpersError::IoError {
                message: format!("Failed to open event log '{}': {}", path.display(), e),
            })?;

        Ok(Self {
            path,
            writer: Some(Mutex::new(file)),
        })
    }

    /// Open an existing log for reading only
    ///
    /// Nothing is created on disk and appends fail.
    pub fn open_existing<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(BumpersError::IoError {
                message: format!("Event log '{}' does not exist", path.display()),
            });
        }
        Ok(Self { path, writer: None })
    }

    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    /// New log file named `bumpers_<YYYYmmdd_HHMMSS>.jsonl` in `directory`
    pub fn in_directory<P: AsRef<Path>>(directory: P) -> Result<Self> {
        let name = format!("bumpers_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S"));
        Self::new(directory.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for FileEventLog {
    fn append(&self, event: &Event) -> Result<()> {
        let writer = self.writer.as_ref().ok_or_else(|| BumpersError::IoError {
            message: format!("Event log '{}' is read-only", self.path.display()),
        })?;
        let line = serde_json::to_string(event)?;
        let mut file = writer.lock().map_err(|_| BumpersError::StorageLocked)?;
        writeln!(file, "{}", line).map_err(|e| BumpersError::IoError {
            message: format!("Failed to write: {}", e),
        })?;
        file.flush()?;
        Ok(())
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|e| BumpersError::IoError {
            message: format!("Failed to open file: {}", e),
        })?;

        let mut events = Vec::new();
        for (index, bytes) in BufReader::new(file).split(b'\n').enumerate() {
            let line = match String::from_utf8(bytes?) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping event that is not UTF-8"
                    );
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) if query.matches(&event) => events.push(event),
                Ok(_) => {}
                // A concurrent writer may leave a partial final line
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable event"
                ),
            }
        }
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
