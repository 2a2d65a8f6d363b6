//! Dump every workload into intermediate storage.

use super::job::{merge_inventories, WorkloadJob, WorkloadKind};
use super::report::{DumpReport, JobOutcome};
use super::staging::Staging;
use crate::config::Config;
use crate::tools::Toolset;
use crate::utils::errors::{PipelineError, Result};
use crate::utils::format::format_duration;
use std::time::Instant;
use tracing::{error, info};

/// Enumerate workloads from both inventories.
pub async fn discover(config: &Config, tools: &Toolset) -> Result<Vec<WorkloadJob>> {
    let vms = tools
        .inventory
        .list(WorkloadKind::Vm)
        .await
        .map_err(PipelineError::Inventory)?;
    let containers = tools
        .inventory
        .list(WorkloadKind::Container)
        .await
        .map_err(PipelineError::Inventory)?;
    info!(vms = vms.len(), containers = containers.len(), "Workload inventory loaded");

    let jobs = merge_inventories(vms, containers, &config.dump.exclude);
    if jobs.is_empty() {
        return Err(PipelineError::NothingToBackUp(
            "no VMs or containers left after exclusions".into(),
        ));
    }
    Ok(jobs)
}

/// Attempt every job, then fail if any of them failed.
pub async fn run(jobs: &[WorkloadJob], tools: &Toolset, staging: &Staging) -> Result<DumpReport> {
    let mut report = DumpReport::default();
    let total = jobs.len();

    for (index, job) in jobs.iter().enumerate() {
        info!(job = %job, "Dumping workload {}/{}", index + 1, total);
        let started = Instant::now();
        let result = tools.dumper.dump(job, staging.root()).await;
        let elapsed = started.elapsed();

        let error = match result {
            Ok(()) => {
                info!(job = %job, elapsed = %format_duration(elapsed), "Dump complete");
                None
            }
            Err(e) => {
                error!(job = %job, elapsed = %format_duration(elapsed), error = %e, "Dump failed");
                Some(e.to_string())
            }
        };
        report.outcomes.push(JobOutcome {
            job: job.clone(),
            elapsed,
            error,
        });
    }

    let failed = report.failed();
    if failed > 0 {
        return Err(PipelineError::Dump { failed, total });
    }
    Ok(report)
}
