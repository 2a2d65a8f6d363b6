//! Offsite Backup Library
//!
//! Encrypted offsite backups of Proxmox VE workloads, pruned under a
//! Grandfather-Father-Son schedule.

pub mod config;
pub mod lifecycle;
pub mod pipeline;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{Pipeline, RunContext, Stage};
pub use utils::errors::PipelineError;
pub type Result<T> = std::result::Result<T, PipelineError>;
