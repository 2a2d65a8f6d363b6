//! Workload dumps through `vzdump`.

use super::command::{self, Echo};
use crate::pipeline::job::WorkloadJob;
use crate::utils::errors::ToolError;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Dumper: Send + Sync {
    async fn probe(&self) -> Result<(), ToolError>;

    /// Write one or more archive files for `job` into `out_dir`.
    async fn dump(&self, job: &WorkloadJob, out_dir: &Path) -> Result<(), ToolError>;
}

pub struct Vzdump {
    program: String,
    mode: String,
    compress: String,
}

impl Vzdump {
    pub fn new(program: impl Into<String>, mode: impl Into<String>, compress: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            mode: mode.into(),
            compress: compress.into(),
        }
    }

    fn args(&self, job: &WorkloadJob, out_dir: &Path) -> Vec<String> {
        vec![
            job.id.to_string(),
            "--mode".to_string(),
            self.mode.clone(),
            "--compress".to_string(),
            self.compress.clone(),
            "--dumpdir".to_string(),
            out_dir.display().to_string(),
        ]
    }
}

#[async_trait]
impl Dumper for Vzdump {
    async fn probe(&self) -> Result<(), ToolError> {
        command::require_executable(&self.program).map(|_| ())
    }

    async fn dump(&self, job: &WorkloadJob, out_dir: &Path) -> Result<(), ToolError> {
        command::run(&self.program, self.args(job, out_dir), None, Echo::Debug).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::WorkloadKind;

    #[test]
    fn test_vzdump_args() {
        let vzdump = Vzdump::new("vzdump", "snapshot", "zstd");
        let job = WorkloadJob {
            id: 104,
            display_name: "db".into(),
            kind: WorkloadKind::Vm,
        };
        assert_eq!(
            vzdump.args(&job, Path::new("/mnt/nas/staging")),
            vec![
                "104",
                "--mode",
                "snapshot",
                "--compress",
                "zstd",
                "--dumpdir",
                "/mnt/nas/staging"
            ]
        );
    }
}
