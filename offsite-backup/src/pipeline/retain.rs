//! GFS pruning of remote snapshot sets.
//!
//! Nothing in this stage fails the run: a failed listing skips retention,
//! and individual deletion failures are tallied.

use super::report::{RetentionOutcome, RetentionTally};
use crate::config::Config;
use crate::tools::Toolset;
use chrono::NaiveDate;
use gfs_retention::{classify, parse_listing, Classification};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RetainOptions {
    pub today: NaiveDate,
    /// Snapshot set written by this run; never deleted
    pub protect: Option<String>,
    /// Classify and report without deleting
    pub dry_run: bool,
}

pub async fn run(
    config: &Config,
    tools: &Toolset,
    opts: &RetainOptions,
) -> (RetentionOutcome, Option<Classification>) {
    let names = match tools.remote.list_dirs(&config.remote.target).await {
        Ok(names) => names,
        Err(e) => {
            error!(remote = %config.remote.target, error = %e, "Cannot list remote snapshot sets, skipping retention");
            return (RetentionOutcome::Skipped(e.to_string()), None);
        }
    };

    let (sets, skipped) = parse_listing(names);
    for name in &skipped {
        debug!(name = %name, "Ignoring remote entry that is not a snapshot set");
    }

    let classification = classify(sets, &config.retention, opts.today);
    let cutoffs = classification.cutoffs();
    info!(
        sets = classification.decisions().len(),
        keep = classification.kept_count(),
        delete = classification.deleted_count(),
        daily_cutoff = %cutoffs.daily,
        weekly_cutoff = %cutoffs.weekly,
        monthly_cutoff = %cutoffs.monthly,
        "Classified remote snapshot sets"
    );

    let mut tally = RetentionTally {
        kept: classification.kept_count(),
        skipped_unparseable: skipped.len(),
        tiers: classification.tier_counts(),
        ..Default::default()
    };

    for decision in classification.deleted() {
        let name = decision.set.name();
        if opts.protect.as_deref() == Some(name) {
            warn!(name = %name, "Policy would delete the snapshot set this run just uploaded; keeping it");
            tally.protected += 1;
            continue;
        }
        if opts.dry_run {
            info!(name = %name, "Would delete snapshot set");
            continue;
        }

        match tools.remote.purge(&config.remote_path(name)).await {
            Ok(()) => {
                info!(name = %name, "Deleted snapshot set");
                tally.deleted += 1;
            }
            Err(e) => {
                error!(name = %name, error = %e, "Failed to delete snapshot set");
                tally.delete_failed += 1;
            }
        }
    }

    let outcome = RetentionOutcome::Completed(tally);
    info!("Retention: {}", outcome);
    (outcome, Some(classification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fake::{FakeRemote, Fakes};

    fn config(daily: u32, weekly: u32, monthly: u32) -> Config {
        let mut config = Config::parse(
            "[storage]\nstaging_dir = \"/s\"\n[remote]\ntarget = \"offsite:pve\"\n[encryption]\nkey_file = \"/k\"\n",
        )
        .unwrap();
        config.retention.daily_keep = daily;
        config.retention.weekly_keep = weekly;
        config.retention.monthly_keep = monthly;
        config
    }

    fn daily_sets(first_day: u32, last_day: u32) -> Vec<String> {
        (first_day..=last_day)
            .map(|d| format!("2026-10-{d:02}_01-00"))
            .collect()
    }

    fn opts(protect: Option<&str>, dry_run: bool) -> RetainOptions {
        RetainOptions {
            today: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            protect: protect.map(str::to_string),
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_deletes_outside_policy_and_skips_foreign_names() {
        let mut names = daily_sets(1, 14);
        names.push("lost+found".into());
        names.push("README".into());
        let fakes = Fakes {
            remote: FakeRemote::with_dirs(names),
            ..Default::default()
        };

        let (outcome, _) = run(&config(7, 0, 0), &fakes.toolset(), &opts(None, false)).await;
        let RetentionOutcome::Completed(tally) = outcome else {
            panic!("retention skipped");
        };
        assert_eq!(tally.kept, 7);
        assert_eq!(tally.deleted, 7);
        assert_eq!(tally.skipped_unparseable, 2);
        assert_eq!(fakes.remote.purged().len(), 7);
        assert!(fakes.remote.purged().contains(&"2026-10-01_01-00".to_string()));
        assert!(!fakes.remote.purged().contains(&"2026-10-08_01-00".to_string()));
        assert!(fakes.remote.dirs().contains(&"README".to_string()));
    }

    #[tokio::test]
    async fn test_deletion_failures_are_tallied() {
        let fakes = Fakes {
            remote: FakeRemote::with_dirs(daily_sets(1, 10)).fail_purge("2026-10-02_01-00"),
            ..Default::default()
        };

        let (outcome, _) = run(&config(7, 0, 0), &fakes.toolset(), &opts(None, false)).await;
        let RetentionOutcome::Completed(tally) = outcome else {
            panic!("retention skipped");
        };
        assert_eq!(tally.deleted, 2);
        assert_eq!(tally.delete_failed, 1);
        assert_eq!(fakes.remote.purged().len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let fakes = Fakes {
            remote: FakeRemote::with_dirs(daily_sets(1, 14)),
            ..Default::default()
        };

        let (outcome, classification) = run(&config(3, 0, 0), &fakes.toolset(), &opts(None, true)).await;
        assert!(matches!(outcome, RetentionOutcome::Completed(t) if t.deleted == 0 && t.kept == 3));
        assert_eq!(classification.unwrap().deleted_count(), 11);
        assert!(fakes.remote.purged().is_empty());
    }

    #[tokio::test]
    async fn test_current_set_is_protected() {
        let fakes = Fakes {
            remote: FakeRemote::with_dirs(daily_sets(12, 14)),
            ..Default::default()
        };

        let (outcome, _) = run(
            &config(0, 0, 0),
            &fakes.toolset(),
            &opts(Some("2026-10-14_01-00"), false),
        )
        .await;
        let RetentionOutcome::Completed(tally) = outcome else {
            panic!("retention skipped");
        };
        assert_eq!(tally.protected, 1);
        assert_eq!(tally.deleted, 2);
        assert_eq!(fakes.remote.dirs(), vec!["2026-10-14_01-00"]);
    }

    #[tokio::test]
    async fn test_listing_failure_skips_retention() {
        let fakes = Fakes {
            remote: FakeRemote::with_dirs(daily_sets(1, 14)).fail_list(),
            ..Default::default()
        };
        let (outcome, classification) = run(&config(1, 0, 0), &fakes.toolset(), &opts(None, false)).await;
        assert!(matches!(outcome, RetentionOutcome::Skipped(_)));
        assert!(classification.is_none());
        assert!(fakes.remote.purged().is_empty());
    }
}
