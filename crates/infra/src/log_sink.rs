//! Append-only text log with failover.
//!
//! A record goes to the primary file. If that fails it goes to the fallback
//! file (whose parent directory is created on demand) followed by a
//! provenance note. If both fail it goes to the console writer (stderr unless
//! replaced with [`LogSink::with_console`]). Appending never
//! returns an error to the caller: the job outcome must not depend on
//! whether its log line could be persisted.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::config::LogPaths;

/// Where a record actually ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Primary,
    Fallback(PathBuf),
    Console,
}

#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("cannot append to {path}: {source}")]
    Append { path: PathBuf, source: io::Error },

    #[error("cannot create log directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
}

/// Writer of last resort, shared by clones of a sink.
pub type Console = Arc<Mutex<dyn Write + Send>>;

#[derive(Clone)]
pub struct LogSink {
    primary: PathBuf,
    fallback: Option<PathBuf>,
    console: Console,
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl LogSink {
    /// Sink whose last resort is the process's stderr.
    pub fn new(primary: impl Into<PathBuf>, fallback: Option<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback,
            console: Arc::new(Mutex::new(io::stderr())),
        }
    }

    /// Replace the last-resort writer.
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn from_paths(paths: &LogPaths) -> Self {
        Self::new(paths.primary.clone(), paths.fallback.clone())
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&Path> {
        self.fallback.as_deref()
    }

    /// Append `record` (a trailing newline is added if missing).
    pub fn append(&self, record: &str) -> LogDestination {
        let record = terminated(record);

        let primary_err = match append_to(&self.primary, &record) {
            Ok(()) => return LogDestination::Primary,
            Err(e) => e,
        };
        tracing::warn!(error = %primary_err, "primary log location unavailable");

        if let Some(fallback) = &self.fallback {
            let noted = format!(
                "{record}Note: Using fallback log location {}\n",
                fallback.display()
            );
            match ensure_parent(fallback).and_then(|()| append_to(fallback, &noted)) {
                Ok(()) => return LogDestination::Fallback(fallback.clone()),
                Err(e) => tracing::warn!(error = %e, "fallback log location unavailable"),
            }
        }

        // Last resort; a failing console has nowhere left to report to.
        let mut console = self.console.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = console.write_all(record.as_bytes()).and_then(|()| console.flush());
        LogDestination::Console
    }
}

fn terminated(record: &str) -> String {
    if record.ends_with('\n') {
        record.to_string()
    } else {
        format!("{record}\n")
    }
}

/// One `write_all` per record so concurrent appenders don't interleave lines.
fn append_to(path: &Path, content: &str) -> Result<(), LogSinkError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|source| LogSinkError::Append {
            path: path.to_path_buf(),
            source,
        })
}

fn ensure_parent(path: &Path) -> Result<(), LogSinkError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| LogSinkError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
