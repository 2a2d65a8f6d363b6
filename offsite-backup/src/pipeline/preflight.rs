//! Environment checks before any workload is touched.
//!
//! Every check runs; all failures are reported together. Nothing here writes
//! to intermediate storage except creating the directory once the mount
//! check has passed.

use super::staging::Staging;
use crate::config::Config;
use crate::tools::Toolset;
use crate::utils::errors::{PipelineError, Result};
use nix::unistd::{access, AccessFlags};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MOUNT_TABLE: &str = "/proc/self/mounts";

pub async fn run(config: &Config, tools: &mut Toolset, staging: &Staging) -> Result<()> {
    let mut failures = Vec::new();

    if let Err(reason) = check_key_file(&config.encryption.key_file) {
        failures.push(reason);
    }

    let probes = [
        ("inventory", tools.inventory.probe().await),
        ("dump", tools.dumper.probe().await),
        ("encryption", tools.encryptor.probe().await),
    ];
    for (what, result) in probes {
        if let Err(e) = result {
            failures.push(format!("{what} tool: {e}"));
        }
    }

    match tools.remote.probe().await {
        Ok(()) => {
            if let Err(e) = tools.remote.list_dirs(&config.remote.target).await {
                failures.push(format!("remote {} unreachable: {}", config.remote.target, e));
            }
        }
        Err(e) => failures.push(format!("transfer tool: {e}")),
    }

    let mounted = match &config.storage.mountpoint {
        Some(mountpoint) => match check_mounted(mountpoint) {
            Ok(()) => true,
            Err(reason) => {
                failures.push(reason);
                false
            }
        },
        None => true,
    };
    if mounted {
        if let Err(e) = staging.ensure() {
            failures.push(format!(
                "cannot create intermediate storage {}: {}",
                staging.root().display(),
                e
            ));
        }
    }

    if let Some(notifier) = &tools.notifier {
        if let Err(e) = notifier.probe().await {
            warn!(error = %e, "Notification tool unavailable, continuing without notifications");
            tools.notifier = None;
        }
    }

    if failures.is_empty() {
        info!("Preflight checks passed");
        Ok(())
    } else {
        Err(PipelineError::Preflight(failures.join("; ")))
    }
}

fn check_key_file(path: &Path) -> std::result::Result<(), String> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("key file {}: {}", path.display(), e))?;
    if !metadata.is_file() {
        return Err(format!("key file {} is not a regular file", path.display()));
    }
    access(path, AccessFlags::R_OK)
        .map_err(|e| format!("key file {} is not readable: {}", path.display(), e))?;

    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        warn!(
            path = %path.display(),
            mode = format!("{:o}", mode & 0o777),
            "Key file is accessible to group or others"
        );
    }
    Ok(())
}

fn check_mounted(mountpoint: &Path) -> std::result::Result<(), String> {
    let table = std::fs::read_to_string(MOUNT_TABLE)
        .map_err(|e| format!("cannot read {MOUNT_TABLE}: {e}"))?;
    if is_mounted(mountpoint, &table) {
        Ok(())
    } else {
        Err(format!("{} is not mounted", mountpoint.display()))
    }
}

/// Whether `mountpoint` appears as a mount target in a `/proc/mounts`
/// style table.
pub fn is_mounted(mountpoint: &Path, table: &str) -> bool {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|target| PathBuf::from(unescape_mount_field(target)) == mountpoint)
}

/// The kernel writes space, tab, newline and backslash in mount paths as
/// three-digit octal escapes.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
