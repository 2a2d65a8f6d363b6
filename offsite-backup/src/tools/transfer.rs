//! Remote store operations through `rclone`.

use super::command::{self, Echo};
use crate::utils::errors::ToolError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// rclone's exit code for "directory not found".
const RCLONE_DIR_NOT_FOUND: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    /// Parallel transfer streams
    pub transfers: u32,
    /// Interval between progress lines
    pub stats_interval: Duration,
    /// Filename patterns left behind
    pub exclude: Vec<String>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn probe(&self) -> Result<(), ToolError>;

    /// Copy the contents of `src` to the remote directory `dest`.
    async fn copy_dir(&self, src: &Path, dest: &str, opts: &CopyOptions) -> Result<(), ToolError>;

    /// Names of the directories directly under `path`.
    async fn list_dirs(&self, path: &str) -> Result<Vec<String>, ToolError>;

    /// Delete `path` and everything below it.
    async fn purge(&self, path: &str) -> Result<(), ToolError>;
}

pub struct Rclone {
    program: String,
}

impl Rclone {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn copy_args(src: &Path, dest: &str, opts: &CopyOptions) -> Vec<String> {
    let mut args = vec![
        "copy".to_string(),
        src.display().to_string(),
        dest.to_string(),
        "--transfers".to_string(),
        opts.transfers.to_string(),
        "--stats".to_string(),
        format!("{}s", opts.stats_interval.as_secs().max(1)),
        "--stats-one-line".to_string(),
        "-v".to_string(),
    ];
    for pattern in &opts.exclude {
        args.push("--exclude".to_string());
        args.push(pattern.clone());
    }
    args
}

#[derive(Deserialize)]
struct LsEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IsDir", default)]
    is_dir: bool,
}

fn parse_lsjson(program: &str, output: &str) -> Result<Vec<String>, ToolError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<LsEntry> = serde_json::from_str(output).map_err(|e| ToolError::Output {
        program: program.to_string(),
        reason: e.to_string(),
    })?;
    Ok(entries
        .into_iter()
        .filter(|e| e.is_dir)
        .map(|e| e.name)
        .collect())
}

#[async_trait]
impl RemoteStore for Rclone {
    async fn probe(&self) -> Result<(), ToolError> {
        command::require_executable(&self.program).map(|_| ())
    }

    async fn copy_dir(&self, src: &Path, dest: &str, opts: &CopyOptions) -> Result<(), ToolError> {
        // rclone writes its stats lines to stderr; surface them as progress.
        command::run(&self.program, copy_args(src, dest, opts), None, Echo::Info).await?;
        Ok(())
    }

    async fn list_dirs(&self, path: &str) -> Result<Vec<String>, ToolError> {
        match command::run(&self.program, ["lsjson", "--dirs-only", path], None, Echo::Quiet).await {
            Ok(out) => parse_lsjson(&self.program, &out.stdout),
            Err(ToolError::Failed {
                code: Some(RCLONE_DIR_NOT_FOUND),
                ..
            }) => {
                tracing::info!(path = %path, "Remote directory does not exist yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn purge(&self, path: &str) -> Result<(), ToolError> {
        command::run(&self.program, ["purge", path], None, Echo::Debug).await?;
        Ok(())
    }
}
