//! Per-branch event histories with endpoint states.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use treehist_core::errors::{ErrorInfo, TreehistError};

use crate::event::CharacterEvent;

/// The character-change history assigned to one branch of the tree.
///
/// Holds the per-site states at the ancestral end (`parent_states`), the
/// per-site states at the descendant end (`child_states`), and the ordered
/// events between them. For every accepted history, replaying the events in
/// time order from the parent states reproduces the child states at every
/// site; inside an open proposal transaction the invariant may be violated
/// until acceptance or rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchHistory {
    parent_states: Vec<usize>,
    child_states: Vec<usize>,
    events: Vec<CharacterEvent>,
}

impl BranchHistory {
    /// Creates a history with no events between the given endpoint states.
    pub fn new(parent_states: Vec<usize>, child_states: Vec<usize>) -> Result<Self, TreehistError> {
        if parent_states.len() != child_states.len() {
            return Err(TreehistError::Config(
                ErrorInfo::new(
                    "endpoint-length-mismatch",
                    "parent and child state vectors must cover the same sites",
                )
                .with_context("parent_len", parent_states.len().to_string())
                .with_context("child_len", child_states.len().to_string()),
            ));
        }
        Ok(Self {
            parent_states,
            child_states,
            events: Vec::new(),
        })
    }

    /// Number of alignment sites covered by this branch.
    pub fn num_sites(&self) -> usize {
        self.parent_states.len()
    }

    /// Per-site states at the ancestral end of the branch.
    pub fn parent_states(&self) -> &[usize] {
        &self.parent_states
    }

    /// Per-site states at the descendant end of the branch.
    pub fn child_states(&self) -> &[usize] {
        &self.child_states
    }

    /// All events in time order.
    pub fn events(&self) -> &[CharacterEvent] {
        &self.events
    }

    /// Snapshot of the events touching the given sites, in time order.
    pub fn events_at_sites(&self, sites: &BTreeSet<usize>) -> Vec<CharacterEvent> {
        self.events
            .iter()
            .filter(|event| sites.contains(&event.site))
            .copied()
            .collect()
    }

    /// Replaces the events at exactly the given sites with `new_events`.
    ///
    /// Events at other sites are untouched. `new_events` must itself only
    /// touch sites within `sites`; the ordering invariant is restored before
    /// returning.
    pub fn update_history(
        &mut self,
        new_events: Vec<CharacterEvent>,
        sites: &BTreeSet<usize>,
    ) -> Result<(), TreehistError> {
        for event in &new_events {
            if event.site >= self.num_sites() {
                return Err(TreehistError::History(
                    ErrorInfo::new("site-out-of-range", "event site beyond alignment width")
                        .with_context("site", event.site.to_string())
                        .with_context("num_sites", self.num_sites().to_string()),
                ));
            }
            if !sites.contains(&event.site) {
                return Err(TreehistError::History(
                    ErrorInfo::new("site-not-selected", "event outside the replaced site set")
                        .with_context("site", event.site.to_string()),
                ));
            }
        }
        self.events.retain(|event| !sites.contains(&event.site));
        self.events.extend(new_events);
        self.events.sort_by(CharacterEvent::time_order);
        Ok(())
    }

    /// Applies the events in time order starting from the parent states.
    pub fn replay(&self) -> Vec<usize> {
        let mut states = self.parent_states.clone();
        for event in &self.events {
            states[event.site] = event.state;
        }
        states
    }

    /// Checks the endpoint invariant: replaying the events reproduces the
    /// child states at every site.
    pub fn is_endpoint_consistent(&self) -> bool {
        self.replay() == self.child_states
    }
}
