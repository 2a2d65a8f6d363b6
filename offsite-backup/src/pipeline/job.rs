//! Workloads and the artifacts their dumps produce.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Vm,
    Container,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Vm => f.write_str("VM"),
            WorkloadKind::Container => f.write_str("CT"),
        }
    }
}

/// One workload to dump. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadJob {
    pub id: u32,
    pub display_name: String,
    pub kind: WorkloadKind,
}

impl fmt::Display for WorkloadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.display_name)
    }
}

/// A file in intermediate storage. Plaintext after the dump, replaced in
/// place by its ciphertext during encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub encrypted: bool,
}

/// Merge the VM and container inventories into one list sorted by id,
/// dropping anything in `exclude`. If an id shows up in both, the VM entry
/// wins.
pub fn merge_inventories(
    vms: Vec<WorkloadJob>,
    containers: Vec<WorkloadJob>,
    exclude: &[u32],
) -> Vec<WorkloadJob> {
    let mut by_id = BTreeMap::new();
    for job in containers.into_iter().chain(vms) {
        if exclude.contains(&job.id) {
            tracing::info!(id = job.id, name = %job.display_name, "Workload excluded by configuration");
            continue;
        }
        by_id.insert(job.id, job);
    }
    by_id.into_values().collect()
}
