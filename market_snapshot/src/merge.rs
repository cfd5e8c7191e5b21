//! Incremental merge of freshly fetched bars into an existing snapshot.
//!
//! ## What this does
//! - Locates the **high-water mark**: the maximum timestamp already present
//!   in the existing snapshot (`None` when it is empty).
//! - Folds both inputs into one canonical dataset: exactly one bar per
//!   timestamp, ascending order, with a later-arriving bar superseding an
//!   earlier one that shares its timestamp (last-write-wins).
//! - Counts how many timestamps strictly above the high-water mark were
//!   appended; zero means "no update necessary" and the caller can skip
//!   publishing.
//!
//! ## Conflict rule
//! When existing and incoming carry the same timestamp with different values,
//! the incoming bar wins: the operational store is treated as more current
//! than the published file. An incoming bar at exactly the high-water mark
//! therefore refreshes that row in place, but does not count as appended;
//! on its own it never triggers a publish.
//!
//! History is never discarded: the merged minimum timestamp equals the
//! existing minimum, and the merged maximum covers both inputs.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::bar::Bar;

/// Result of an incremental merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The canonical merged dataset: deduplicated, ascending by timestamp.
    pub bars: Vec<Bar>,
    /// Count of distinct timestamps strictly newer than the existing
    /// snapshot's high-water mark.
    pub appended: usize,
}

impl MergeOutcome {
    /// True when nothing new was appended and publishing can be skipped.
    pub fn is_noop(&self) -> bool {
        self.appended == 0
    }
}

/// Merges `incoming` bars into the `existing` snapshot content.
///
/// Both inputs may be unsorted and may contain duplicate timestamps; the
/// output is sorted and unique, with the last occurrence in
/// existing-then-incoming order winning each duplicate.
pub fn merge(existing: &[Bar], incoming: &[Bar]) -> MergeOutcome {
    let high_water_mark: Option<NaiveDateTime> = existing.iter().map(|b| b.timestamp).max();

    let mut by_timestamp: BTreeMap<NaiveDateTime, Bar> = BTreeMap::new();
    for bar in existing.iter().chain(incoming.iter()) {
        by_timestamp.insert(bar.timestamp, bar.clone());
    }

    let appended = match high_water_mark {
        Some(hwm) => by_timestamp.keys().filter(|ts| **ts > hwm).count(),
        None => by_timestamp.len(),
    };

    MergeOutcome {
        bars: by_timestamp.into_values().collect(),
        appended,
    }
}
