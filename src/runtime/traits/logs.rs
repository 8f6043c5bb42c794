// ABOUTME: Log operations trait for container runtimes.
// ABOUTME: Raw multiplexed log bytes and a decoded streaming follow mode.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Log retrieval operations.
#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// Fetch container logs as the runtime's raw multiplexed byte stream.
    ///
    /// Each frame is an 8-byte header followed by its payload; see
    /// [`crate::deploy::demux_logs`].
    async fn raw_logs(&self, id: &ContainerId, opts: &LogOptions) -> Result<Bytes, LogError>;

    /// Stream decoded logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError>;
}

/// Options for log retrieval.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Follow log output (like `tail -f`).
    pub follow: bool,
    /// Show timestamps.
    pub timestamps: bool,
    /// Number of lines to show from end (None = all).
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Create options for following all logs.
    pub fn follow_all() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            timestamps: false,
            tail: None,
        }
    }

    /// Create options for the last N timestamped lines of both streams.
    pub fn tail(n: u64) -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: true,
            tail: Some(n),
        }
    }
}

/// A single log line from a container.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// The log content.
    pub content: String,
    /// Whether this is from stdout or stderr.
    pub stream: LogStream,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("malformed log stream: {0}")]
    Malformed(#[from] std::io::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}
