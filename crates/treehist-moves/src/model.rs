//! The shared model state proposals read and mutate.

use treehist_core::errors::{ErrorInfo, TreehistError};
use treehist_model::{HistoryStore, RateProvider, Tree};

/// Bundles the externally owned collaborators a proposal operates on: the
/// tree view, the rate provider, and the branch histories.
///
/// The driver owns the model and hands it to exactly one proposal at a time;
/// nothing here is synchronized.
pub struct Model {
    /// Tree consumed for branch lengths, ages, and root detection.
    pub tree: Tree,
    /// Supplier of generator rates and transition probabilities.
    pub rate: Box<dyn RateProvider + Send + Sync>,
    /// One branch history per tree node.
    pub histories: HistoryStore,
}

impl Model {
    /// Assembles a model, validating that the pieces agree: one history per
    /// tree node, and every endpoint state below the rate provider's state
    /// count.
    pub fn new(
        tree: Tree,
        rate: Box<dyn RateProvider + Send + Sync>,
        histories: HistoryStore,
    ) -> Result<Self, TreehistError> {
        if tree.len() != histories.len() {
            return Err(TreehistError::Config(
                ErrorInfo::new("tree-store-mismatch", "one branch history is needed per node")
                    .with_context("nodes", tree.len().to_string())
                    .with_context("histories", histories.len().to_string()),
            ));
        }
        let num_states = rate.size();
        for (node, history) in histories.iter().enumerate() {
            let out_of_range = history
                .parent_states()
                .iter()
                .chain(history.child_states())
                .find(|&&state| state >= num_states);
            if let Some(&state) = out_of_range {
                return Err(TreehistError::Config(
                    ErrorInfo::new(
                        "dimension-mismatch",
                        "endpoint state outside the generator's state space",
                    )
                    .with_context("node", node.to_string())
                    .with_context("state", state.to_string())
                    .with_context("num_states", num_states.to_string()),
                ));
            }
        }
        Ok(Self {
            tree,
            rate,
            histories,
        })
    }

    /// Number of character states in the model.
    pub fn num_states(&self) -> usize {
        self.rate.size()
    }

    /// Number of alignment sites per branch.
    pub fn num_sites(&self) -> usize {
        self.histories.num_sites()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("nodes", &self.tree.len())
            .field("num_states", &self.rate.size())
            .field("num_sites", &self.histories.num_sites())
            .finish_non_exhaustive()
    }
}
