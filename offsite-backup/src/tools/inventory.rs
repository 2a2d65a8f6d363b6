//! Workload inventories (`qm list` for VMs, `pct list` for containers).

use super::command::{self, Echo};
use crate::pipeline::job::{WorkloadJob, WorkloadKind};
use crate::utils::errors::ToolError;
use async_trait::async_trait;

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Check that the inventory tools can be invoked
    async fn probe(&self) -> Result<(), ToolError>;

    /// Workloads of one kind on this host, in listing order
    async fn list(&self, kind: WorkloadKind) -> Result<Vec<WorkloadJob>, ToolError>;
}

pub struct ProxmoxInventory {
    qm: String,
    pct: String,
}

impl ProxmoxInventory {
    pub fn new(qm: impl Into<String>, pct: impl Into<String>) -> Self {
        Self {
            qm: qm.into(),
            pct: pct.into(),
        }
    }
}

#[async_trait]
impl Inventory for ProxmoxInventory {
    async fn probe(&self) -> Result<(), ToolError> {
        command::require_executable(&self.qm)?;
        command::require_executable(&self.pct)?;
        Ok(())
    }

    async fn list(&self, kind: WorkloadKind) -> Result<Vec<WorkloadJob>, ToolError> {
        match kind {
            WorkloadKind::Vm => {
                let out = command::run(&self.qm, ["list"], None, Echo::Quiet).await?;
                Ok(parse_qm_list(&out.stdout))
            }
            WorkloadKind::Container => {
                let out = command::run(&self.pct, ["list"], None, Echo::Quiet).await?;
                Ok(parse_pct_list(&out.stdout))
            }
        }
    }
}

/// `VMID NAME STATUS MEM(MB) BOOTDISK(GB) PID`; the name is the second column.
pub fn parse_qm_list(output: &str) -> Vec<WorkloadJob> {
    parse_rows(output, WorkloadKind::Vm, |cols| cols.get(1).copied())
}

/// `VMID Status Lock Name`; Lock is often blank, so the name is the last
/// column when there are more than two.
pub fn parse_pct_list(output: &str) -> Vec<WorkloadJob> {
    parse_rows(output, WorkloadKind::Container, |cols| {
        if cols.len() > 2 {
            cols.last().copied()
        } else {
            None
        }
    })
}

fn parse_rows<F>(output: &str, kind: WorkloadKind, name: F) -> Vec<WorkloadJob>
where
    F: for<'a> Fn(&[&'a str]) -> Option<&'a str>,
{
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let id = cols.first()?.parse::<u32>().ok()?;
            Some(WorkloadJob {
                id,
                display_name: name(&cols).unwrap_or_default().to_string(),
                kind,
            })
        })
        .collect()
}
