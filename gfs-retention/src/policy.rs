//! Retention policy parameters and the cutoff dates derived from them.

use crate::error::RetentionError;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Sets kept under the daily (Son) tier
    #[serde(default = "default_daily_keep")]
    pub daily_keep: u32,

    /// Sets kept under the weekly (Father) tier
    #[serde(default = "default_weekly_keep")]
    pub weekly_keep: u32,

    /// Sets kept under the monthly (Grandfather) tier
    #[serde(default = "default_monthly_keep")]
    pub monthly_keep: u32,

    /// Day of week for weekly sets, 0 = Sunday .. 6 = Saturday
    #[serde(default)]
    pub weekly_day: u8,

    /// Day of month for monthly sets, 1..=31
    #[serde(default = "default_monthly_day")]
    pub monthly_day: u8,
}

fn default_daily_keep() -> u32 {
    7
}

fn default_weekly_keep() -> u32 {
    4
}

fn default_monthly_keep() -> u32 {
    6
}

fn default_monthly_day() -> u8 {
    1
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily_keep: default_daily_keep(),
            weekly_keep: default_weekly_keep(),
            monthly_keep: default_monthly_keep(),
            weekly_day: 0,
            monthly_day: default_monthly_day(),
        }
    }
}

impl RetentionPolicy {
    pub fn validate(&self) -> Result<(), RetentionError> {
        if self.weekly_day > 6 {
            return Err(RetentionError::WeeklyDay(self.weekly_day));
        }
        if !(1..=31).contains(&self.monthly_day) {
            return Err(RetentionError::MonthlyDay(self.monthly_day));
        }
        Ok(())
    }

    /// Upper bound on the number of sets this policy can keep.
    pub fn max_kept(&self) -> usize {
        self.daily_keep as usize + self.weekly_keep as usize + self.monthly_keep as usize
    }
}

/// Oldest date still eligible for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoffs {
    pub daily: NaiveDate,
    pub weekly: NaiveDate,
    pub monthly: NaiveDate,
}

impl Cutoffs {
    /// Daily and weekly windows subtract days; the monthly window subtracts
    /// calendar months, clamping to the last day of a shorter month.
    pub fn compute(policy: &RetentionPolicy, today: NaiveDate) -> Self {
        let weekly_days = u64::from(policy.weekly_keep) * 7;
        Self {
            daily: today
                .checked_sub_days(Days::new(u64::from(policy.daily_keep)))
                .unwrap_or(NaiveDate::MIN),
            weekly: today
                .checked_sub_days(Days::new(weekly_days))
                .unwrap_or(NaiveDate::MIN),
            monthly: today
                .checked_sub_months(Months::new(policy.monthly_keep))
                .unwrap_or(NaiveDate::MIN),
        }
    }
}
