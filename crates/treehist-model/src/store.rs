//! Branch-keyed storage for histories with change notification.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use treehist_core::errors::{ErrorInfo, TreehistError};

use crate::history::BranchHistory;

/// One [`BranchHistory`] per tree node, plus the dirty set used for
/// dependency notification.
///
/// Proposals call [`HistoryStore::fire_change_event`] after installing a
/// candidate so that dependent cached computations can be invalidated by the
/// driver; the store only records which branches changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStore {
    histories: Vec<BranchHistory>,
    #[serde(default)]
    dirty: BTreeSet<usize>,
}

impl HistoryStore {
    /// Creates a store from one history per node; all histories must cover
    /// the same number of sites.
    pub fn new(histories: Vec<BranchHistory>) -> Result<Self, TreehistError> {
        if let Some(first) = histories.first() {
            let num_sites = first.num_sites();
            for (node, history) in histories.iter().enumerate() {
                if history.num_sites() != num_sites {
                    return Err(TreehistError::Config(
                        ErrorInfo::new("ragged-alignment", "histories must share a site count")
                            .with_context("node", node.to_string())
                            .with_context("expected", num_sites.to_string())
                            .with_context("actual", history.num_sites().to_string()),
                    ));
                }
            }
        }
        Ok(Self {
            histories,
            dirty: BTreeSet::new(),
        })
    }

    /// Number of branches tracked by the store.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether the store tracks no branches.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Number of alignment sites per branch (zero for an empty store).
    pub fn num_sites(&self) -> usize {
        self.histories.first().map_or(0, BranchHistory::num_sites)
    }

    /// Immutable access to the history of one branch.
    pub fn history(&self, node: usize) -> Result<&BranchHistory, TreehistError> {
        self.histories.get(node).ok_or_else(|| missing_node(node))
    }

    /// Mutable access to the history of one branch.
    pub fn history_mut(&mut self, node: usize) -> Result<&mut BranchHistory, TreehistError> {
        self.histories
            .get_mut(node)
            .ok_or_else(|| missing_node(node))
    }

    /// Iterates over all branch histories in node order.
    pub fn iter(&self) -> impl Iterator<Item = &BranchHistory> {
        self.histories.iter()
    }

    /// Marks a branch as changed so dependent computations get invalidated.
    pub fn fire_change_event(&mut self, node: usize) {
        self.dirty.insert(node);
    }

    /// Drains the set of branches flagged since the last call.
    pub fn take_dirty(&mut self) -> BTreeSet<usize> {
        std::mem::take(&mut self.dirty)
    }
}

fn missing_node(node: usize) -> TreehistError {
    TreehistError::History(
        ErrorInfo::new("no-history-for-node", "no branch history at the requested node")
            .with_context("node", node.to_string()),
    )
}
