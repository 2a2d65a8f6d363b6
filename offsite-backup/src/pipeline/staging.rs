//! Intermediate storage between the dump and the upload.

use super::job::BackupArtifact;
use crate::tools::crypt::CIPHERTEXT_EXTENSION;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Dump tool log files; never encrypted or uploaded.
pub const LOG_EXTENSION: &str = "log";

/// What a best-effort clear managed to remove.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClearSummary {
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Staging {
    root: PathBuf,
}

impl Staging {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it is missing.
    pub fn ensure(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Plaintext archives waiting for encryption: regular files directly
    /// under the root that are neither ciphertext nor logs, sorted by path.
    pub fn plaintext_artifacts(&self) -> std::io::Result<Vec<BackupArtifact>> {
        let mut artifacts = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if has_extension(path, CIPHERTEXT_EXTENSION) || has_extension(path, LOG_EXTENSION) {
                continue;
            }
            artifacts.push(BackupArtifact {
                path: path.to_path_buf(),
                size_bytes: entry.metadata().map_err(std::io::Error::other)?.len(),
                encrypted: false,
            });
        }
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(artifacts)
    }

    /// Remove everything under the root, keeping the root itself. Failures
    /// are logged and counted, never returned.
    pub fn clear(&self) -> ClearSummary {
        let mut summary = ClearSummary::default();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return summary,
            Err(e) => {
                tracing::error!(dir = %self.root.display(), error = %e, "Cannot read intermediate storage for cleanup");
                summary.failed += 1;
                return summary;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let result = match entry.file_type() {
                Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path),
                _ => fs::remove_file(&path),
            };
            match result {
                Ok(()) => summary.removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged file");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}
