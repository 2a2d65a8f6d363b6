//! The backup run: preflight, dump, encrypt, upload, retain.
//!
//! Stages run strictly in order and each must finish before the next
//! starts. Every fatal error goes through [`Pipeline::fail`], which clears
//! intermediate storage (once the run has got past preflight) and sends the
//! failure notification.

pub mod dump;
pub mod encrypt;
pub mod job;
pub mod preflight;
pub mod report;
pub mod retain;
pub mod staging;
pub mod upload;

use crate::config::Config;
use crate::lifecycle::ShutdownCoordinator;
use crate::tools::Toolset;
use crate::utils::errors::{PipelineError, Result};
use crate::utils::logger;
use chrono::{NaiveDate, NaiveDateTime};
use gfs_retention::{Classification, SnapshotSet};
use report::{RetentionOutcome, RunReport};
use retain::RetainOptions;
use staging::Staging;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Preflight,
    Dumping,
    Encrypting,
    Uploading,
    Retaining,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Preflight => "preflight",
            Stage::Dumping => "dumping",
            Stage::Encrypting => "encrypting",
            Stage::Uploading => "uploading",
            Stage::Retaining => "retaining",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Whether a run that stops here may have left its own files in
    /// intermediate storage. Before the dump stage the staging path is not
    /// known to be the right mount.
    pub fn may_hold_artifacts(self) -> bool {
        matches!(
            self,
            Stage::Dumping | Stage::Encrypting | Stage::Uploading | Stage::Retaining
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: NaiveDateTime,
    /// Name of the snapshot set this run uploads
    pub stamp: String,
}

impl RunContext {
    pub fn new(started_at: NaiveDateTime) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            stamp: SnapshotSet::stamp(started_at),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.started_at.date()
    }
}

pub struct Pipeline<'a> {
    config: &'a Config,
    tools: Toolset,
    staging: Staging,
    shutdown: ShutdownCoordinator,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, tools: Toolset, shutdown: ShutdownCoordinator) -> Self {
        Self {
            config,
            tools,
            staging: Staging::new(&config.storage.staging_dir),
            shutdown,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!(stage = %stage, from = %self.stage, "Stage transition");
        self.stage = stage;
    }

    /// Execute a full run. SIGINT/SIGTERM abort the in-flight stage.
    pub async fn run(&mut self, ctx: &RunContext) -> Result<RunReport> {
        let span = tracing::info_span!("run", run_id = %ctx.run_id, stamp = %ctx.stamp);
        async move {
            info!(started_at = %ctx.started_at, "Backup run starting");
            let shutdown = self.shutdown.clone();
            let token = shutdown.token();

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(PipelineError::Interrupted(
                    shutdown.reason().unwrap_or("cancellation").to_string(),
                )),
                result = self.stages(ctx) => result,
            };

            match result {
                Ok(report) => {
                    self.enter(Stage::Done);
                    self.clear_staging();
                    info!("Backup run finished\n{}", report);
                    if self.config.notify.on_success {
                        let subject = format!("[offsite-backup] OK on {}: {}", host(), ctx.stamp);
                        self.notify(&subject, &report.to_string()).await;
                    }
                    Ok(report)
                }
                Err(e) => {
                    self.fail(&e).await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn stages(&mut self, ctx: &RunContext) -> Result<RunReport> {
        let started = Instant::now();

        self.enter(Stage::Preflight);
        preflight::run(self.config, &mut self.tools, &self.staging).await?;

        self.enter(Stage::Dumping);
        let leftovers = self.staging.clear();
        if leftovers.removed > 0 {
            warn!(removed = leftovers.removed, "Removed leftovers of an earlier run from intermediate storage");
        }
        let jobs = dump::discover(self.config, &self.tools).await?;
        let dump = dump::run(&jobs, &self.tools, &self.staging).await?;

        self.enter(Stage::Encrypting);
        let encrypt = encrypt::run(self.config, &self.tools, &self.staging).await?;

        self.enter(Stage::Uploading);
        let upload = upload::run(self.config, &self.tools, &self.staging, &encrypt, &ctx.stamp).await?;

        self.enter(Stage::Retaining);
        let opts = RetainOptions {
            today: ctx.today(),
            protect: Some(ctx.stamp.clone()),
            dry_run: false,
        };
        let (retention, _) = retain::run(self.config, &self.tools, &opts).await;

        Ok(RunReport {
            run_id: ctx.run_id.to_string(),
            stamp: ctx.stamp.clone(),
            dump,
            encrypt,
            upload,
            retention,
            elapsed: started.elapsed(),
        })
    }

    /// The single failure path for fatal errors.
    async fn fail(&mut self, cause: &PipelineError) {
        let failed_in = self.stage;
        error!(stage = %failed_in, error = %cause, "Backup run failed");

        // Interrupted before the first stage: the run never left Idle
        if failed_in != Stage::Idle {
            self.enter(Stage::Failed);
        }
        if failed_in.may_hold_artifacts() {
            self.clear_staging();
        }

        let subject = format!("[offsite-backup] FAILED on {}: {}", host(), failed_in);
        let tail = logger::tail(&self.config.log.file, self.config.log.notify_tail_lines);
        let mut body = format!("Stage: {failed_in}\nError: {cause}\n");
        if !tail.is_empty() {
            body.push_str("\nRecent log:\n");
            body.push_str(&tail.join("\n"));
            body.push('\n');
        }
        self.notify(&subject, &body).await;
    }

    fn clear_staging(&self) {
        let summary = self.staging.clear();
        if summary.failed > 0 {
            warn!(removed = summary.removed, failed = summary.failed, "Intermediate storage only partly cleared");
        } else {
            info!(removed = summary.removed, "Intermediate storage cleared");
        }
    }

    async fn notify(&self, subject: &str, body: &str) {
        let Some(notifier) = &self.tools.notifier else {
            return;
        };
        if let Err(e) = notifier.notify(subject, body).await {
            warn!(error = %e, "Failed to send notification");
        }
    }

    /// Preflight checks only.
    pub async fn check(&mut self) -> Result<()> {
        self.enter(Stage::Preflight);
        let result = preflight::run(self.config, &mut self.tools, &self.staging).await;
        self.enter(if result.is_ok() { Stage::Done } else { Stage::Failed });
        result
    }

    /// Retention against the remote without a backup.
    pub async fn prune(&mut self, today: NaiveDate, dry_run: bool) -> Result<(RetentionOutcome, Classification)> {
        self.tools
            .remote
            .probe()
            .await
            .map_err(|e| PipelineError::Preflight(format!("transfer tool: {e}")))?;

        self.enter(Stage::Retaining);
        let opts = RetainOptions {
            today,
            protect: None,
            dry_run,
        };
        match retain::run(self.config, &self.tools, &opts).await {
            (outcome, Some(classification)) => {
                self.enter(Stage::Done);
                Ok((outcome, classification))
            }
            (outcome, None) => {
                self.enter(Stage::Failed);
                Err(PipelineError::RetentionSkipped(outcome.to_string()))
            }
        }
    }
}

fn host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string())
}
