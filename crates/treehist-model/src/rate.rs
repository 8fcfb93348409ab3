//! Rate providers: CTMC generator matrices and their transition
//! probabilities.

use serde::{Deserialize, Serialize};
use treehist_core::errors::{ErrorInfo, TreehistError};
use treehist_core::matrix::{expm, SquareMatrix};

/// Row-sum tolerance accepted when validating a generator.
const ROW_SUM_TOL: f64 = 1e-9;

/// Supplier of CTMC rates and finite-time transition probabilities.
///
/// This is the external collaborator surface: proposals consume it and never
/// re-derive generator structure themselves.
pub trait RateProvider {
    /// Number of character states.
    fn size(&self) -> usize;

    /// Generator entry `Q[from][to]`.
    fn rate(&self, from: usize, to: usize) -> f64;

    /// Refreshes derived quantities after parameter edits. Must be called
    /// before the provider is used inside a proposal.
    fn update_matrix(&mut self);

    /// Row-stochastic transition probability matrix for the given branch
    /// length, `exp(Q * branch_length)`.
    fn transition_probabilities(&self, branch_length: f64) -> Result<SquareMatrix, TreehistError>;

    /// Dominating rate `mu = max_i -Q[i][i]`, the uniformization clock rate.
    fn dominating_rate(&self) -> f64 {
        let n = self.size();
        (0..n).map(|i| -self.rate(i, i)).fold(0.0, f64::max)
    }

    /// Uniformized jump matrix `U = I + Q/mu` together with `mu`.
    ///
    /// A zero dominating rate means no state can be left; `U` degenerates to
    /// the identity and the sampled path has zero jumps by construction.
    fn uniformized_matrix(&self) -> (SquareMatrix, f64) {
        let n = self.size();
        let mu = self.dominating_rate();
        if mu <= 0.0 {
            return (SquareMatrix::identity(n), 0.0);
        }
        let mut u = SquareMatrix::identity(n);
        for i in 0..n {
            for j in 0..n {
                u.set(i, j, u.get(i, j) + self.rate(i, j) / mu);
            }
        }
        (u, mu)
    }
}

/// A concrete, validated generator matrix.
///
/// Off-diagonal entries are the instantaneous rates; diagonals are derived so
/// each row sums to zero. Editing a rate marks the generator stale until
/// [`RateProvider::update_matrix`] restores the row-sum invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorMatrix {
    q: SquareMatrix,
    stale: bool,
}

impl GeneratorMatrix {
    /// Builds a generator from a square matrix of rates.
    ///
    /// Off-diagonal entries must be finite and non-negative; diagonal entries
    /// are recomputed from the off-diagonal row sums, so callers may pass
    /// either a full generator or just the rates.
    pub fn new(rates: SquareMatrix) -> Result<Self, TreehistError> {
        let n = rates.size();
        if n < 2 {
            return Err(TreehistError::Config(
                ErrorInfo::new("too-few-states", "a generator needs at least two states")
                    .with_context("size", n.to_string()),
            ));
        }
        for i in 0..n {
            for j in 0..n {
                let value = rates.get(i, j);
                if !value.is_finite() {
                    return Err(TreehistError::Rate(
                        ErrorInfo::new("non-finite-rate", "generator entries must be finite")
                            .with_context("from", i.to_string())
                            .with_context("to", j.to_string()),
                    ));
                }
                if i != j && value < 0.0 {
                    return Err(TreehistError::Rate(
                        ErrorInfo::new("negative-rate", "off-diagonal rates must be >= 0")
                            .with_context("from", i.to_string())
                            .with_context("to", j.to_string())
                            .with_context("rate", value.to_string()),
                    ));
                }
            }
        }
        let mut generator = Self {
            q: rates,
            stale: true,
        };
        generator.update_matrix();
        Ok(generator)
    }

    /// Sets the off-diagonal rate `Q[from][to]` and marks the generator
    /// stale. Diagonal entries cannot be edited directly.
    pub fn set_rate(&mut self, from: usize, to: usize, value: f64) -> Result<(), TreehistError> {
        if from == to {
            return Err(TreehistError::Rate(
                ErrorInfo::new("diagonal-edit", "diagonals are derived, edit off-diagonals")
                    .with_context("state", from.to_string()),
            ));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(TreehistError::Rate(
                ErrorInfo::new("negative-rate", "off-diagonal rates must be finite and >= 0")
                    .with_context("from", from.to_string())
                    .with_context("to", to.to_string())
                    .with_context("rate", value.to_string()),
            ));
        }
        self.q.set(from, to, value);
        self.stale = true;
        Ok(())
    }

    /// Whether a rate edit is pending an [`RateProvider::update_matrix`].
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn stale_error(&self) -> TreehistError {
        TreehistError::Rate(
            ErrorInfo::new("stale-generator", "rates were edited without update_matrix")
                .with_hint("call update_matrix() before computing probabilities"),
        )
    }
}

impl RateProvider for GeneratorMatrix {
    fn size(&self) -> usize {
        self.q.size()
    }

    fn rate(&self, from: usize, to: usize) -> f64 {
        self.q.get(from, to)
    }

    fn update_matrix(&mut self) {
        let n = self.q.size();
        for i in 0..n {
            let off_diagonal: f64 = (0..n).filter(|&j| j != i).map(|j| self.q.get(i, j)).sum();
            self.q.set(i, i, -off_diagonal);
        }
        self.stale = false;
    }

    fn transition_probabilities(&self, branch_length: f64) -> Result<SquareMatrix, TreehistError> {
        if self.stale {
            return Err(self.stale_error());
        }
        let p = expm(&self.q, branch_length)?;
        if !p.is_row_stochastic(ROW_SUM_TOL.sqrt()) {
            return Err(TreehistError::Rate(
                ErrorInfo::new(
                    "non-stochastic-probabilities",
                    "transition probabilities drifted from row-stochastic",
                )
                .with_context("branch_length", branch_length.to_string()),
            ));
        }
        Ok(p)
    }
}
