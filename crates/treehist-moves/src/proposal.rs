//! The transactional contract every MCMC move implements.

use serde::{Deserialize, Serialize};
use treehist_core::errors::TreehistError;
use treehist_core::rng::RngHandle;

use crate::model::Model;

/// Externally owned parameter a proposal reads or mutates, reported to the
/// driver for dependency bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    /// The per-branch character histories.
    CharacterHistory,
    /// The tree (branch lengths and ages).
    Tree,
    /// The rate generator matrix.
    RateMatrix,
}

/// A Metropolis-Hastings move with transactional propose/accept/reject
/// semantics.
///
/// The driver sequences each invocation strictly: `prepare`, then `propose`,
/// then exactly one of `accept` or `reject`. `prepare` snapshots whatever the
/// move needs for exact rollback; `propose` installs the candidate into the
/// shared model (so downstream likelihoods see it) and returns the log
/// proposal-density ratio, which the driver combines with the model's own
/// prior/likelihood ratio. A `propose` error aborts the transaction before
/// anything is installed, so `reject` still restores the pre-transaction
/// state exactly.
pub trait Proposal {
    /// Short stable name used in summaries and logs.
    fn name(&self) -> &'static str;

    /// Parameters this proposal reads or mutates.
    fn targets(&self) -> &[Target];

    /// Selects the target branch/sites and snapshots the current state.
    fn prepare(&mut self, model: &mut Model, rng: &mut RngHandle) -> Result<(), TreehistError>;

    /// Builds and installs the candidate state, returning the log Hastings
    /// ratio contribution of the proposal densities
    /// (`stored_ln_prob - proposed_ln_prob`).
    fn propose(&mut self, model: &mut Model, rng: &mut RngHandle) -> Result<f64, TreehistError>;

    /// Finalizes the transaction, discarding the rollback snapshot.
    fn accept(&mut self);

    /// Rolls the shared model back to its pre-transaction state, bit exact.
    fn reject(&mut self, model: &mut Model) -> Result<(), TreehistError>;

    /// Adjusts internal step-size-like parameters from the observed
    /// acceptance rate. Moves without a continuous knob ignore it.
    fn tune(&mut self, acceptance_rate: f64);

    /// One-line summary of the tuning parameters, for run reports.
    fn parameter_summary(&self) -> String;
}
