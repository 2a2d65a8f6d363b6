//! Error types for the backup pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of an external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} not found on PATH or not executable")]
    NotFound { program: String },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unexpected output from {program}: {reason}")]
    Output { program: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal run failures. Every variant ends the run with a non-zero exit.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Another run holds the lock at {0}")]
    Locked(PathBuf),

    #[error("Preflight failed: {0}")]
    Preflight(String),

    #[error("Workload inventory failed: {0}")]
    Inventory(#[source] ToolError),

    #[error("Nothing to back up: {0}")]
    NothingToBackUp(String),

    #[error("Dump failed for {failed} of {total} workloads")]
    Dump { failed: usize, total: usize },

    #[error("Encryption failed for {}: {reason}", path.display())]
    Encryption { path: PathBuf, reason: String },

    #[error("Upload to {destination} failed after {elapsed}: {reason}")]
    Upload {
        destination: String,
        elapsed: String,
        reason: String,
    },

    #[error("Retention did not run: {0}")]
    RetentionSkipped(String),

    #[error("Interrupted by {0}")]
    Interrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<gfs_retention::RetentionError> for PipelineError {
    fn from(e: gfs_retention::RetentionError) -> Self {
        PipelineError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
