//! The GFS classifier.
//!
//! Sets are visited newest first. Each tier keeps its own running counter and
//! tags every set that satisfies its rule until the counter reaches the cap.
//! Tiers are evaluated independently, so one set can be counted by several
//! tiers at once; with a sparse backup history the greedy packing keeps the
//! N most recent *candidates* per tier rather than N calendar periods.

use crate::policy::{Cutoffs, RetentionPolicy};
use crate::snapshot::SnapshotSet;
use chrono::{Datelike, NaiveDate};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Daily
    Son,
    /// Weekly
    Father,
    /// Monthly
    Grandfather,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Son, Tier::Father, Tier::Grandfather];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Son => "son",
            Tier::Father => "father",
            Tier::Grandfather => "grandfather",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Tier::Son => 0b001,
            Tier::Father => 0b010,
            Tier::Grandfather => 0b100,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of tiers a snapshot matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TierSet(u8);

impl TierSet {
    pub fn insert(&mut self, tier: Tier) {
        self.0 |= tier.bit();
    }

    pub fn contains(self, tier: Tier) -> bool {
        self.0 & tier.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Tier> {
        Tier::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<Tier> for TierSet {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        let mut set = TierSet::default();
        for tier in iter {
            set.insert(tier);
        }
        set
    }
}

impl fmt::Display for TierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let names: Vec<&str> = self.iter().map(Tier::as_str).collect();
        f.write_str(&names.join("+"))
    }
}

/// Outcome for one snapshot set. `keep()` is derived from the matched tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionDecision {
    pub set: SnapshotSet,
    pub tiers: TierSet,
}

impl RetentionDecision {
    pub fn keep(&self) -> bool {
        !self.tiers.is_empty()
    }
}

/// Number of sets each tier claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub son: usize,
    pub father: usize,
    pub grandfather: usize,
}

impl TierCounts {
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Son => self.son,
            Tier::Father => self.father,
            Tier::Grandfather => self.grandfather,
        }
    }

    fn bump(&mut self, tier: Tier) {
        match tier {
            Tier::Son => self.son += 1,
            Tier::Father => self.father += 1,
            Tier::Grandfather => self.grandfather += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    decisions: Vec<RetentionDecision>,
    counts: TierCounts,
    cutoffs: Cutoffs,
}

impl Classification {
    /// Decisions, newest first.
    pub fn decisions(&self) -> &[RetentionDecision] {
        &self.decisions
    }

    pub fn kept(&self) -> impl Iterator<Item = &RetentionDecision> {
        self.decisions.iter().filter(|d| d.keep())
    }

    pub fn deleted(&self) -> impl Iterator<Item = &RetentionDecision> {
        self.decisions.iter().filter(|d| !d.keep())
    }

    pub fn kept_count(&self) -> usize {
        self.kept().count()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted().count()
    }

    pub fn tier_counts(&self) -> TierCounts {
        self.counts
    }

    pub fn cutoffs(&self) -> Cutoffs {
        self.cutoffs
    }
}

/// Classify `sets` against `policy` as of `today`.
///
/// Input order does not matter; sets are sorted by name, newest first,
/// before the counters run.
pub fn classify<I>(sets: I, policy: &RetentionPolicy, today: NaiveDate) -> Classification
where
    I: IntoIterator<Item = SnapshotSet>,
{
    let cutoffs = Cutoffs::compute(policy, today);
    let mut sets: Vec<SnapshotSet> = sets.into_iter().collect();
    sets.sort_by(|a, b| b.name().cmp(a.name()));

    let mut counts = TierCounts::default();
    let decisions = sets
        .into_iter()
        .map(|set| {
            let date = set.date();
            let mut tiers = TierSet::default();
            for tier in Tier::ALL {
                if counts.get(tier) < cap(policy, tier) && matches(tier, date, policy, &cutoffs) {
                    tiers.insert(tier);
                    counts.bump(tier);
                }
            }
            RetentionDecision { set, tiers }
        })
        .collect();

    Classification {
        decisions,
        counts,
        cutoffs,
    }
}

fn cap(policy: &RetentionPolicy, tier: Tier) -> usize {
    match tier {
        Tier::Son => policy.daily_keep as usize,
        Tier::Father => policy.weekly_keep as usize,
        Tier::Grandfather => policy.monthly_keep as usize,
    }
}

fn matches(tier: Tier, date: NaiveDate, policy: &RetentionPolicy, cutoffs: &Cutoffs) -> bool {
    match tier {
        Tier::Son => date >= cutoffs.daily,
        Tier::Father => {
            date.weekday().num_days_from_sunday() == u32::from(policy.weekly_day)
                && date >= cutoffs.weekly
        }
        Tier::Grandfather => {
            date.day() == u32::from(policy.monthly_day) && date >= cutoffs.monthly
        }
    }
}
