//! Grandfather-Father-Son retention classification.
//!
//! Partitions dated snapshot sets into keep/delete using three independent,
//! overlapping counting rules (daily "Son", weekly "Father", monthly
//! "Grandfather"). Pure: no I/O, no clock access.

pub mod classify;
pub mod error;
pub mod policy;
pub mod snapshot;

// Re-export commonly used types
pub use classify::{classify, Classification, RetentionDecision, Tier, TierCounts, TierSet};
pub use error::RetentionError;
pub use policy::{Cutoffs, RetentionPolicy};
pub use snapshot::{parse_listing, SnapshotSet};
pub type Result<T> = std::result::Result<T, RetentionError>;
