//! Remote-first execution with a local fallback.
//!
//! Shared by replenishment, reporting and reminders: run the remote
//! operation, and on any [`RemoteError`] run the local one instead. The
//! remote failure is kept alongside the local result so the caller can log
//! both.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::log_sink::{LogDestination, LogSink};
use crate::remote::RemoteError;

/// Which path produced a job's result.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Remote,
    Local,
    Failed,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Remote => "remote",
            Method::Local => "local",
            Method::Failed => "failed",
        })
    }
}

#[derive(Debug)]
pub enum Resolution<T, E> {
    Remote(T),
    Local { value: T, remote_error: RemoteError },
    Failed { remote_error: RemoteError, local_error: E },
}

impl<T, E> Resolution<T, E> {
    pub fn method(&self) -> Method {
        match self {
            Resolution::Remote(_) => Method::Remote,
            Resolution::Local { .. } => Method::Local,
            Resolution::Failed { .. } => Method::Failed,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Resolution::Remote(value) | Resolution::Local { value, .. } => Some(value),
            Resolution::Failed { .. } => None,
        }
    }

    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Resolution::Remote(_) => None,
            Resolution::Local { remote_error, .. } | Resolution::Failed { remote_error, .. } => {
                Some(remote_error)
            }
        }
    }
}

/// Run `remote`; if it fails, run `local`. `local` is never called after a
/// remote success.
pub async fn remote_first<T, E, R, RF, L, LF>(job: &str, remote: R, local: L) -> Resolution<T, E>
where
    R: FnOnce() -> RF,
    RF: Future<Output = Result<T, RemoteError>>,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let remote_error = match remote().await {
        Ok(value) => {
            tracing::info!(job, method = %Method::Remote, "job completed via remote endpoint");
            return Resolution::Remote(value);
        }
        Err(e) => e,
    };
    tracing::warn!(job, error = %remote_error, "remote path failed, falling back to local store");

    match local().await {
        Ok(value) => {
            tracing::info!(job, method = %Method::Local, "job completed via local fallback");
            Resolution::Local {
                value,
                remote_error,
            }
        }
        Err(local_error) => {
            tracing::error!(job, remote_error = %remote_error, local_error = %local_error, "job failed on both paths");
            Resolution::Failed {
                remote_error,
                local_error,
            }
        }
    }
}

/// [`remote_first`], then append `render(&resolution)` to `sink` as one record.
pub async fn remote_first_logged<T, E, R, RF, L, LF, F>(
    job: &str,
    sink: &LogSink,
    remote: R,
    local: L,
    render: F,
) -> (Resolution<T, E>, LogDestination)
where
    R: FnOnce() -> RF,
    RF: Future<Output = Result<T, RemoteError>>,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<T, E>>,
    E: fmt::Display,
    F: FnOnce(&Resolution<T, E>) -> String,
{
    let resolution = remote_first(job, remote, local).await;
    let destination = sink.append(&render(&resolution));
    (resolution, destination)
}
