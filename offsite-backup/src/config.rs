//! Configuration for the backup runner.
//!
//! Loaded once from a TOML file at startup and passed by reference to every
//! component; nothing reads configuration from ambient state afterwards.

use crate::utils::errors::PipelineError;
use gfs_retention::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/offsite-backup/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Exclusive lock held for the duration of a run
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub encryption: EncryptionConfig,

    #[serde(default)]
    pub dump: DumpConfig,

    #[serde(default)]
    pub retention: RetentionPolicy,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Intermediate storage holding artifacts between dump and upload
    pub staging_dir: PathBuf,

    /// Mountpoint that must be mounted before the run touches `staging_dir`
    #[serde(default)]
    pub mountpoint: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// rclone remote path, e.g. `offsite:pve-backups`
    pub target: String,

    /// Parallel transfer streams
    #[serde(default = "default_transfers")]
    pub transfers: u32,

    /// Seconds between progress lines during upload
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Passphrase file handed to gpg
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// vzdump backup mode
    #[serde(default = "default_dump_mode")]
    pub mode: String,

    /// vzdump compression (zstd, lzo, gzip)
    #[serde(default = "default_compress")]
    pub compress: String,

    /// Workload ids never backed up
    #[serde(default)]
    pub exclude: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append-only log file
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Rotate at startup once the file exceeds this size
    #[serde(default = "default_log_max_bytes")]
    pub max_bytes: u64,

    /// Rotated files to keep (file.1 .. file.N)
    #[serde(default = "default_log_keep_rotated")]
    pub keep_rotated: u32,

    /// Log lines included in failure notifications
    #[serde(default = "default_notify_tail_lines")]
    pub notify_tail_lines: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Mail recipient; no notifications are sent when unset
    #[serde(default)]
    pub recipient: Option<String>,

    /// Also notify on successful runs
    #[serde(default)]
    pub on_success: bool,
}

/// Executables driven by the pipeline. Bare names are resolved on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_vzdump")]
    pub vzdump: String,

    #[serde(default = "default_qm")]
    pub qm: String,

    #[serde(default = "default_pct")]
    pub pct: String,

    #[serde(default = "default_gpg")]
    pub gpg: String,

    #[serde(default = "default_rclone")]
    pub rclone: String,

    #[serde(default = "default_mail")]
    pub mail: String,
}

// Default values
fn default_lock_file() -> PathBuf {
    PathBuf::from("/run/offsite-backup.lock")
}

fn default_transfers() -> u32 {
    4
}

fn default_stats_interval_secs() -> u64 {
    60
}

fn default_dump_mode() -> String {
    "snapshot".to_string()
}

fn default_compress() -> String {
    "zstd".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/offsite-backup.log")
}

fn default_log_max_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_log_keep_rotated() -> u32 {
    3
}

fn default_notify_tail_lines() -> usize {
    40
}

fn default_vzdump() -> String {
    "vzdump".to_string()
}

fn default_qm() -> String {
    "qm".to_string()
}

fn default_pct() -> String {
    "pct".to_string()
}

fn default_gpg() -> String {
    "gpg".to_string()
}

fn default_rclone() -> String {
    "rclone".to_string()
}

fn default_mail() -> String {
    "mail".to_string()
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            mode: default_dump_mode(),
            compress: default_compress(),
            exclude: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            max_bytes: default_log_max_bytes(),
            keep_rotated: default_log_keep_rotated(),
            notify_tail_lines: default_notify_tail_lines(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            vzdump: default_vzdump(),
            qm: default_qm(),
            pct: default_pct(),
            gpg: default_gpg(),
            rclone: default_rclone(),
            mail: default_mail(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, PipelineError> {
        let config: Config =
            toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.retention.validate()?;

        if self.remote.target.trim().is_empty() {
            return Err(PipelineError::Config("remote.target must not be empty".into()));
        }
        if self.remote.transfers == 0 {
            return Err(PipelineError::Config("remote.transfers must be at least 1".into()));
        }
        if !self.storage.staging_dir.is_absolute() {
            return Err(PipelineError::Config(format!(
                "storage.staging_dir must be absolute, got {}",
                self.storage.staging_dir.display()
            )));
        }
        if let Some(mountpoint) = &self.storage.mountpoint {
            if !self.storage.staging_dir.starts_with(mountpoint) {
                return Err(PipelineError::Config(format!(
                    "storage.staging_dir {} is not under mountpoint {}",
                    self.storage.staging_dir.display(),
                    mountpoint.display()
                )));
            }
        }
        Ok(())
    }

    /// Remote path of the snapshot set named `name`.
    pub fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.remote.target.trim_end_matches('/'), name)
    }
}
