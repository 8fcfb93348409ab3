//! Single character-change events along a branch.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One state change at one alignment site, immutable after creation.
///
/// `time` is relative to the branch start and lives in `[0, 1)`. Several
/// events may share a site (successive changes at that site) but never an
/// identical `(site, time)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterEvent {
    /// Alignment site the event applies to.
    pub site: usize,
    /// Event time relative to the branch start, in `[0, 1)`.
    pub time: f64,
    /// State the site changes into at `time`.
    pub state: usize,
}

impl CharacterEvent {
    /// Creates a new event record.
    pub fn new(site: usize, time: f64, state: usize) -> Self {
        Self { site, time, state }
    }

    /// Total order used by branch histories: increasing time, site as the
    /// stable tiebreak. Times are drawn from `uniform01` and are never NaN.
    pub fn time_order(&self, other: &CharacterEvent) -> Ordering {
        self.time
            .partial_cmp(&other.time)
            .unwrap_or(Ordering::Equal)
            .then(self.site.cmp(&other.site))
    }
}
