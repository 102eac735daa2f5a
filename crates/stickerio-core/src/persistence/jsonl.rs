//! JSONL Event Log
//!
//! Append-only JSON-lines file. The whole file is read back into an ordered
//! index on open; every accepted insert is appended and flushed before it
//! is acknowledged.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

use stickerio_events::{Epoch, Event};

use super::{EventIndex, EventLog, LogError};

struct Inner {
    writer: BufWriter<File>,
    index: EventIndex,
}

/// Event log persisted to a JSONL file
pub struct JsonlEventLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlEventLog {
    /// Open (or create) the log at `path`, loading any existing events.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source: std::io::Error| LogError::Io {
            path: path.clone(),
            source,
        };

        let mut index = EventIndex::default();
        if path.exists() {
            let reader = BufReader::new(File::open(&path).map_err(io_err)?);
            for (number, line) in reader.lines().enumerate() {
                let line = line.map_err(io_err)?;
                if line.trim().is_empty() {
                    continue;
                }
                let event = Event::from_jsonl(&line).map_err(|source| LogError::Corrupt {
                    path: path.clone(),
                    line: number + 1,
                    source,
                })?;
                if !index.insert(event) {
                    warn!(path = ?path, line = number + 1, "duplicate event id in log, keeping the first");
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        info!(path = ?path, events = index.len(), "event log opened");

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                index,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, LogError> {
        self.inner
            .lock()
            .map_err(|_| LogError::Unavailable("event log lock poisoned".into()))
    }
}

impl EventLog for JsonlEventLog {
    fn insert(&self, event: &Event) -> Result<bool, LogError> {
        let mut inner = self.lock()?;
        if inner.index.contains(&event.id) {
            return Ok(false);
        }
        let line = event.to_jsonl().map_err(|source| LogError::Encode {
            id: event.id.clone(),
            source,
        })?;
        let io_err = |source: std::io::Error| LogError::Io {
            path: self.path.clone(),
            source,
        };
        writeln!(inner.writer, "{}", line).map_err(io_err)?;
        inner.writer.flush().map_err(io_err)?;
        inner.index.insert(event.clone());
        Ok(true)
    }

    fn list_due(&self, until_epoch: Epoch) -> Result<Vec<Event>, LogError> {
        Ok(self.lock()?.index.list_due(until_epoch))
    }
}
