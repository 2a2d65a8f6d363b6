//! Bulk transfer of intermediate storage to the remote.

use super::report::{EncryptReport, UploadReport};
use super::staging::{Staging, LOG_EXTENSION};
use crate::config::Config;
use crate::tools::transfer::CopyOptions;
use crate::tools::Toolset;
use crate::utils::errors::{PipelineError, Result};
use crate::utils::format::{format_bytes, format_duration, format_rate};
use std::time::{Duration, Instant};
use tracing::info;

pub fn copy_options(config: &Config) -> CopyOptions {
    CopyOptions {
        transfers: config.remote.transfers,
        stats_interval: Duration::from_secs(config.remote.stats_interval_secs),
        exclude: vec![format!("*.{LOG_EXTENSION}")],
    }
}

/// Copy everything staged into a new snapshot set named `stamp`.
pub async fn run(
    config: &Config,
    tools: &Toolset,
    staging: &Staging,
    encrypted: &EncryptReport,
    stamp: &str,
) -> Result<UploadReport> {
    let destination = config.remote_path(stamp);
    let bytes = encrypted.ciphertext_bytes();
    info!(
        destination = %destination,
        size = %format_bytes(bytes),
        transfers = config.remote.transfers,
        "Uploading snapshot set"
    );

    let started = Instant::now();
    tools
        .remote
        .copy_dir(staging.root(), &destination, &copy_options(config))
        .await
        .map_err(|e| PipelineError::Upload {
            destination: destination.clone(),
            elapsed: format_duration(started.elapsed()),
            reason: e.to_string(),
        })?;
    let elapsed = started.elapsed();

    info!(
        destination = %destination,
        elapsed = %format_duration(elapsed),
        rate = %format_rate(bytes, elapsed),
        "Upload complete"
    );
    Ok(UploadReport {
        destination,
        bytes,
        elapsed,
    })
}
