//! Utility modules for the backup runner.

pub mod errors;
pub mod format;
pub mod logger;

pub use errors::{PipelineError, Result, ToolError};
