//! Per-stage summaries collected over a run.

use super::job::{BackupArtifact, WorkloadJob};
use crate::utils::format::{format_bytes, format_duration, format_rate};
use gfs_retention::TierCounts;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: WorkloadJob,
    pub elapsed: Duration,
    /// Failure reason, `None` on success
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DumpReport {
    pub outcomes: Vec<JobOutcome>,
}

impl DumpReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EncryptReport {
    /// Ciphertext artifacts left in intermediate storage
    pub artifacts: Vec<BackupArtifact>,
    /// Total size before encryption
    pub plaintext_bytes: u64,
    pub elapsed: Duration,
}

impl EncryptReport {
    pub fn ciphertext_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size_bytes).sum()
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub destination: String,
    pub bytes: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionTally {
    pub kept: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub skipped_unparseable: usize,
    /// Sets classified for deletion but left alone because this run created them
    pub protected: usize,
    pub tiers: TierCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionOutcome {
    Completed(RetentionTally),
    /// The remote listing failed; nothing was classified or deleted
    Skipped(String),
}

impl fmt::Display for RetentionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionOutcome::Completed(t) => {
                write!(
                    f,
                    "{} kept (son {}, father {}, grandfather {}), {} deleted, {} delete failures",
                    t.kept, t.tiers.son, t.tiers.father, t.tiers.grandfather, t.deleted, t.delete_failed
                )?;
                if t.skipped_unparseable > 0 {
                    write!(f, ", {} unparseable names skipped", t.skipped_unparseable)?;
                }
                if t.protected > 0 {
                    write!(f, ", {} protected", t.protected)?;
                }
                Ok(())
            }
            RetentionOutcome::Skipped(reason) => write!(f, "retention skipped: {reason}"),
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub stamp: String,
    pub dump: DumpReport,
    pub encrypt: EncryptReport,
    pub upload: UploadReport,
    pub retention: RetentionOutcome,
    pub elapsed: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({}) finished in {}", self.run_id, self.stamp, format_duration(self.elapsed))?;
        writeln!(f)?;
        writeln!(f, "Dump: {} workloads", self.dump.attempted())?;
        for outcome in &self.dump.outcomes {
            writeln!(f, "  {} in {}", outcome.job, format_duration(outcome.elapsed))?;
        }
        writeln!(
            f,
            "Encrypt: {} artifacts, {} plaintext, {} ciphertext",
            self.encrypt.artifacts.len(),
            format_bytes(self.encrypt.plaintext_bytes),
            format_bytes(self.encrypt.ciphertext_bytes())
        )?;
        writeln!(
            f,
            "Upload: {} in {} ({})",
            self.upload.destination,
            format_duration(self.upload.elapsed),
            format_rate(self.upload.bytes, self.upload.elapsed)
        )?;
        writeln!(f, "Retention: {}", self.retention)
    }
}
