//! Single-run guard.
//!
//! Two overlapping runs would share intermediate storage and race on the
//! same remote snapshot name, so every run holds an exclusive advisory lock
//! on `lock_file` until it exits. The lock file carries the holder's PID.

use crate::utils::errors::PipelineError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting; fails with `Locked` if a run holds it.
    pub fn acquire(path: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Open without truncating: the PID belongs to whoever holds the lock.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|_| PipelineError::Locked(path.to_path_buf()))?;

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");

        let held = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).err().unwrap();
        assert!(matches!(err, PipelineError::Locked(p) if p == path));

        drop(held);
        assert!(RunLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_lock_file_records_pid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("run.lock");

        let lock = RunLock::acquire(&path).unwrap();
        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }
}
