//! Logging configuration using tracing.
//!
//! Events go to stdout and are appended, without ANSI colors, to the
//! configured log file. The file is rotated by size once at startup, and
//! only by a process holding the run lock.

use crate::config::LogConfig;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level. `rotate` must only be set
/// while the run lock is held, so a concurrent run's file is never renamed.
pub fn init(level: &str, log: &LogConfig, rotate: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if rotate {
        rotate_if_needed(&log.file, log.max_bytes, log.keep_rotated);
    }

    let dir = log
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log
        .file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log.file has no file name: {}", log.file.display()))?;
    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(appender))
        .try_init()?;

    Ok(())
}

/// Shift `file` to `file.1` (and older rotations up by one) once it reaches
/// `max_bytes`. At most `keep` rotated files survive.
pub fn rotate_if_needed(path: &Path, max_bytes: u64, keep: u32) {
    let size = match fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < max_bytes {
        return;
    }

    let path_str = path.display().to_string();
    if keep == 0 {
        report_rotation(path, fs::remove_file(path));
        return;
    }

    // Oldest rotation falls off the end
    let oldest = format!("{path_str}.{keep}");
    report_rotation(Path::new(&oldest), fs::remove_file(&oldest));
    for i in (1..keep).rev() {
        let from = format!("{path_str}.{i}");
        report_rotation(Path::new(&from), fs::rename(&from, format!("{path_str}.{}", i + 1)));
    }
    report_rotation(path, fs::rename(path, format!("{path_str}.1")));
}

/// The subscriber is not installed yet while rotating, so failures go to
/// stderr. Gaps in the rotation chain are expected.
fn report_rotation(path: &Path, result: std::io::Result<()>) {
    if let Err(e) = result {
        if e.kind() != ErrorKind::NotFound {
            eprintln!("offsite-backup: cannot rotate {}: {}", path.display(), e);
        }
    }
}

/// Last `n` lines of the log file, for failure notifications.
pub fn tail(path: &Path, n: usize) -> Vec<String> {
    let Ok(bytes) = fs::read(path) else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|l| l.to_string()).collect()
}
