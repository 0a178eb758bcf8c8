//! Contributor ledger built from pull request participants.
//!
//! Every login seen on a pull request gets a [`ContributionRecord`] the first time it shows up,
//! and its declared location is tallied into a [`LocationHistogram`] at that moment only.

use crate::types::PullRequest;
use serde::ser::{Serialize, Serializer};
use std::collections::HashMap;

/// Location label used when a participant declares none.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// A string-keyed map that iterates in first-insertion order.
///
/// Entries live in a vector; the hash index only maps a key to its slot. Nothing is ever
/// removed, so slots stay valid for the lifetime of the map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FirstSeenMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> FirstSeenMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Returns the entry for `key`, inserting `make()` at the end if it is new.
    pub fn entry_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        let slot = match self.index.get(key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.entries.push((key.to_string(), make()));
                self.index.insert(key.to_string(), slot);
                slot
            }
        };
        &mut self.entries[slot].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl<V: Serialize> Serialize for FirstSeenMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(key, value)| (key, value)))
    }
}

/// Activity attributed to one login.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContributionRecord {
    pub pull_requests_opened: u64,
    pub pull_requests_merged: u64,
    pub pull_request_comments: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// Location label to number of distinct logins declaring it.
pub type LocationHistogram = FirstSeenMap<u64>;

/// Login to accumulated activity.
pub type Contributors = FirstSeenMap<ContributionRecord>;

/// Folds a page of pull requests into the contributor ledger.
///
/// Takes both maps by value and hands back the updated pair, so a caller wanting to keep an
/// earlier snapshot clones it before the call.
///
/// For each participant, in list order: the author of the pull request is credited with
/// opening it (and, when `merged` is set, with merging it and with its changed lines); every
/// other participant is credited with one comment. A login appearing twice in one list is
/// credited twice.
pub fn fold_contributors(
    prs: &[PullRequest],
    mut locations: LocationHistogram,
    mut contributors: Contributors,
) -> (LocationHistogram, Contributors) {
    for pr in prs {
        for participant in &pr.participants {
            if !contributors.contains_key(&participant.login) {
                let label = match participant.location.as_deref() {
                    Some(location) if !location.is_empty() => location,
                    _ => UNKNOWN_LOCATION,
                };
                *locations.entry_or_insert_with(label, || 0) += 1;
            }

            let record =
                contributors.entry_or_insert_with(&participant.login, ContributionRecord::default);

            if pr.is_authored_by(&participant.login) {
                record.pull_requests_opened += 1;
                if pr.merged {
                    record.pull_requests_merged += 1;
                    for file in &pr.changed_files {
                        record.lines_added += file.additions;
                        record.lines_removed += file.deletions;
                    }
                }
            } else {
                record.pull_request_comments += 1;
            }
        }
    }

    (locations, contributors)
}
