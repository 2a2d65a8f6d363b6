use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetentionError {
    #[error("weekly_day must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    WeeklyDay(u8),

    #[error("monthly_day must be between 1 and 31, got {0}")]
    MonthlyDay(u8),

    #[error("snapshot name {0:?} does not start with a YYYY-MM-DD date")]
    UnparseableName(String),
}
