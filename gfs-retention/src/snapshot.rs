//! Remote snapshot set names.
//!
//! A snapshot set is one upload batch, named by the run's start time
//! (`YYYY-MM-DD_HH-MM`). Only the leading calendar date matters for
//! retention; anything after it is carried along untouched.

use crate::error::RetentionError;
use chrono::{NaiveDate, NaiveDateTime};

/// `strftime` format of a snapshot set name.
pub const NAME_FORMAT: &str = "%Y-%m-%d_%H-%M";

const DATE_PREFIX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotSet {
    name: String,
    date: NaiveDate,
}

impl SnapshotSet {
    /// Parse a remote entry name. Trailing `/` (directory listings) is ignored.
    pub fn parse(name: &str) -> Result<Self, RetentionError> {
        let name = name.trim_end_matches('/');
        let date = leading_date(name)
            .ok_or_else(|| RetentionError::UnparseableName(name.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            date,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Name for a set created at `at`.
    pub fn stamp(at: NaiveDateTime) -> String {
        at.format(NAME_FORMAT).to_string()
    }
}

impl std::fmt::Display for SnapshotSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn leading_date(name: &str) -> Option<NaiveDate> {
    let prefix = name.get(..DATE_PREFIX_LEN)?;
    let well_formed = prefix.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 => b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Split a remote listing into parsed snapshot sets and the names that were
/// skipped because they carry no leading date.
pub fn parse_listing<I, S>(names: I) -> (Vec<SnapshotSet>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sets = Vec::new();
    let mut skipped = Vec::new();
    for name in names {
        match SnapshotSet::parse(name.as_ref()) {
            Ok(set) => sets.push(set),
            Err(_) => skipped.push(name.as_ref().to_string()),
        }
    }
    (sets, skipped)
}
