//! Endpoint-conditioned CTMC path resampling by uniformization.
//!
//! For each selected site the proposal redraws the full sequence of state
//! changes between the fixed parent and child states of one branch, exactly
//! under the endpoint-conditioned path law (Hobolth and Stone, 2009): the
//! jump count is drawn from the truncated `Poisson(mu L, k) (U^k)[s0][s1]`
//! mass, jump times are i.i.d. uniform on the branch, and intermediate states
//! walk a discrete bridge toward the fixed endpoint. Virtual jumps that do
//! not change state are collapsed away before installation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use treehist_core::errors::{ErrorInfo, TreehistError};
use treehist_core::matrix::SquareMatrix;
use treehist_core::rng::RngHandle;
use treehist_core::stats::poisson_pmf;
use treehist_model::{BranchHistory, CharacterEvent, RateProvider, TreeNode};

use crate::model::Model;
use crate::proposal::{Proposal, Target};

/// Multiplier applied to the root age when a synthetic tail branch is
/// modeled above the root.
const TAIL_LENGTH_FACTOR: f64 = 5.0;

const PATH_TARGETS: &[Target] = &[Target::CharacterHistory, Target::Tree, Target::RateMatrix];

/// Configuration for [`PathUniformizationProposal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathProposalConfig {
    /// Per-site resampling probability; one uniformly chosen site is always
    /// included on top of the independent draws.
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    /// Truncation bound on the uniformization jump count. Exceeding it
    /// aborts the proposal with a descriptive error.
    #[serde(default = "default_max_jumps")]
    pub max_jumps: usize,
    /// Whether the root branch carries a synthetic tail segment.
    #[serde(default)]
    pub use_tail: bool,
    /// Pins the proposal to one branch instead of sampling a node each
    /// transaction.
    #[serde(default)]
    pub node: Option<usize>,
}

fn default_lambda() -> f64 {
    0.1
}

fn default_max_jumps() -> usize {
    100
}

impl Default for PathProposalConfig {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            max_jumps: default_max_jumps(),
            use_tail: false,
            node: None,
        }
    }
}

/// Endpoint-conditioned path resampling move over one branch at a time.
///
/// The transaction owns its `stored_*`/`proposed_*` snapshots between
/// `prepare()` and their disposal at `accept()`/`reject()`; the shared
/// [`BranchHistory`] is mutated in place only when `propose()` installs the
/// candidate and when `reject()` restores the original events.
#[derive(Debug, Clone)]
pub struct PathUniformizationProposal {
    lambda: f64,
    max_jumps: usize,
    use_tail: bool,
    fixed_node: Option<usize>,

    num_nodes: usize,
    num_sites: usize,

    node: usize,
    next_node: Option<usize>,
    next_sites: Option<BTreeSet<usize>>,
    site_set: BTreeSet<usize>,

    stored_events: Vec<CharacterEvent>,
    proposed_events: Vec<CharacterEvent>,
    stored_ln_prob: f64,
    proposed_ln_prob: f64,

    // Uniformized matrix powers U^0..U^k, rebuilt per invocation and grown
    // lazily while sampling jump counts.
    dtmc_powers: Vec<SquareMatrix>,
}

impl PathUniformizationProposal {
    /// Creates the proposal, validating the configuration against the model
    /// it will operate on. Dimension inconsistencies are fatal here, not at
    /// sampling time.
    pub fn new(config: PathProposalConfig, model: &Model) -> Result<Self, TreehistError> {
        if !(config.lambda > 0.0 && config.lambda <= 1.0) {
            return Err(TreehistError::Config(
                ErrorInfo::new("bad-lambda", "lambda must lie in (0, 1]")
                    .with_context("lambda", config.lambda.to_string()),
            ));
        }
        if config.max_jumps == 0 {
            return Err(TreehistError::Config(
                ErrorInfo::new("bad-max-jumps", "max_jumps must be at least 1")
                    .with_hint("the truncation bound should be configured generously"),
            ));
        }
        if model.num_sites() == 0 {
            return Err(TreehistError::Config(ErrorInfo::new(
                "empty-alignment",
                "the model has no sites to resample",
            )));
        }
        if let Some(node) = config.node {
            if node >= model.tree.len() {
                return Err(TreehistError::Config(
                    ErrorInfo::new("node-out-of-range", "pinned node beyond tree size")
                        .with_context("node", node.to_string())
                        .with_context("num_nodes", model.tree.len().to_string()),
                ));
            }
        }
        Ok(Self {
            lambda: config.lambda,
            max_jumps: config.max_jumps,
            use_tail: config.use_tail,
            fixed_node: config.node,
            num_nodes: model.tree.len(),
            num_sites: model.num_sites(),
            node: config.node.unwrap_or(0),
            next_node: None,
            next_sites: None,
            site_set: BTreeSet::new(),
            stored_events: Vec::new(),
            proposed_events: Vec::new(),
            stored_ln_prob: 0.0,
            proposed_ln_prob: 0.0,
            dtmc_powers: Vec::new(),
        })
    }

    /// Pins the branch for the next transaction only.
    pub fn pin_node(&mut self, node: usize) {
        self.next_node = Some(node);
    }

    /// Pins the resampled site set for the next transaction only.
    pub fn pin_sites(&mut self, sites: BTreeSet<usize>) {
        self.next_sites = Some(sites);
    }

    /// Branch targeted by the current transaction.
    pub fn current_node(&self) -> usize {
        self.node
    }

    /// Sites resampled by the current transaction.
    pub fn current_sites(&self) -> &BTreeSet<usize> {
        &self.site_set
    }

    /// Log path probability cached by `prepare()` for the current history.
    pub fn stored_ln_prob(&self) -> f64 {
        self.stored_ln_prob
    }

    fn effective_branch_length(&self, node: &TreeNode) -> Option<f64> {
        if !node.is_root() {
            Some(node.branch_length)
        } else if self.use_tail {
            Some(node.age * TAIL_LENGTH_FACTOR)
        } else {
            None
        }
    }

    /// CTMC log probability of the full branch history under the current
    /// generator: for each inter-event interval, the log rate of the observed
    /// transition minus the total outgoing rate (summed over all sites) times
    /// the interval, plus the final holding term to the branch end.
    fn compute_ln_proposal(
        &self,
        node: &TreeNode,
        history: &BranchHistory,
        rate: &dyn RateProvider,
    ) -> f64 {
        let branch_length = match self.effective_branch_length(node) {
            Some(length) => length,
            None => return 0.0,
        };
        let mut states = history.parent_states().to_vec();
        let mut rate_sum: f64 = states.iter().map(|&s| -rate.rate(s, s)).sum();
        let mut ln_prob = 0.0;
        let mut t = 0.0;
        for event in history.events() {
            let dt = event.time - t;
            let from = states[event.site];
            ln_prob += rate.rate(from, event.state).ln() - rate_sum * dt * branch_length;
            rate_sum += rate.rate(from, from) - rate.rate(event.state, event.state);
            states[event.site] = event.state;
            t = event.time;
        }
        ln_prob - rate_sum * (1.0 - t) * branch_length
    }

    /// Validates one-shot pins after they have been consumed, so a failed
    /// `prepare` never leaves the proposal wedged on a bad pin.
    fn validate_pinned(
        &self,
        pinned_node: Option<usize>,
        pinned_sites: Option<&BTreeSet<usize>>,
    ) -> Result<(), TreehistError> {
        if let Some(node) = pinned_node {
            if node >= self.num_nodes {
                return Err(TreehistError::Config(
                    ErrorInfo::new("node-out-of-range", "pinned node beyond tree size")
                        .with_context("node", node.to_string())
                        .with_context("num_nodes", self.num_nodes.to_string()),
                ));
            }
        }
        if let Some(sites) = pinned_sites {
            if sites.is_empty() {
                return Err(TreehistError::Config(ErrorInfo::new(
                    "empty-site-set",
                    "pinned site set must name at least one site",
                )));
            }
            if let Some(&site) = sites.iter().find(|&&s| s >= self.num_sites) {
                return Err(TreehistError::Config(
                    ErrorInfo::new("site-out-of-range", "pinned site beyond alignment width")
                        .with_context("site", site.to_string())
                        .with_context("num_sites", self.num_sites.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Grows the power table so `U^k` is available, multiplying the running
    /// power by `U` once per missing entry.
    fn ensure_power(&mut self, u_matrix: &SquareMatrix, k: usize) {
        if self.dtmc_powers.is_empty() {
            self.dtmc_powers.push(SquareMatrix::identity(u_matrix.size()));
        }
        while self.dtmc_powers.len() <= k {
            let next = self.dtmc_powers[self.dtmc_powers.len() - 1].mul(u_matrix);
            self.dtmc_powers.push(next);
        }
    }

    /// Samples the jump count for one site by inverse CDF over the truncated
    /// endpoint-conditioned mass.
    fn sample_jump_count(
        &mut self,
        site: usize,
        s0: usize,
        s1: usize,
        poisson_mean: f64,
        endpoint_prob: f64,
        branch_length: f64,
        u_matrix: &SquareMatrix,
        rng: &mut RngHandle,
    ) -> Result<usize, TreehistError> {
        let u = rng.uniform01();
        let mut cumulative = 0.0;
        // Zero jumps carry mass only when the endpoints agree.
        if s0 == s1 {
            cumulative = poisson_pmf(poisson_mean, 0) / endpoint_prob;
        }
        let mut jumps = 0usize;
        while cumulative <= u {
            jumps += 1;
            if jumps > self.max_jumps {
                return Err(TreehistError::Proposal(
                    ErrorInfo::new(
                        "max-jumps-exceeded",
                        "uniformization jump count exceeded the truncation bound",
                    )
                    .with_context("max_jumps", self.max_jumps.to_string())
                    .with_context("node", self.node.to_string())
                    .with_context("site", site.to_string())
                    .with_context("branch_length", branch_length.to_string())
                    .with_context("dominating_rate", (poisson_mean / branch_length).to_string())
                    .with_hint("the branch length or rate scale makes the bound inadequate"),
                ));
            }
            self.ensure_power(u_matrix, jumps);
            cumulative += poisson_pmf(poisson_mean, jumps as u32)
                * self.dtmc_powers[jumps].get(s0, s1)
                / endpoint_prob;
        }
        Ok(jumps)
    }

    /// Resamples the path for one site between its fixed endpoint states.
    fn sample_site_path(
        &mut self,
        site: usize,
        s0: usize,
        s1: usize,
        poisson_mean: f64,
        endpoint_prob: f64,
        branch_length: f64,
        u_matrix: &SquareMatrix,
        rng: &mut RngHandle,
    ) -> Result<Vec<CharacterEvent>, TreehistError> {
        let jumps = self.sample_jump_count(
            site,
            s0,
            s1,
            poisson_mean,
            endpoint_prob,
            branch_length,
            u_matrix,
            rng,
        )?;

        if jumps == 0 || (jumps == 1 && s0 == s1) {
            // No jumps, or a single virtual jump with no net change.
            return Ok(Vec::new());
        }

        let mut times: Vec<f64> = (0..jumps).map(|_| rng.uniform01()).collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let num_states = u_matrix.size();
        let mut assigned = Vec::with_capacity(jumps);
        let mut current = s0;
        for jump_index in 1..=jumps {
            let next = if jump_index == jumps {
                // The last jump must land on the fixed endpoint.
                s1
            } else {
                // Bridge toward the endpoint: weight each state by the step
                // probability times the remaining bridge mass.
                let remaining = &self.dtmc_powers[jumps - jump_index];
                let weights: Vec<f64> = (0..num_states)
                    .map(|state| u_matrix.get(current, state) * remaining.get(state, s1))
                    .collect();
                sample_weighted(&weights, rng)
            };
            assigned.push(next);
            current = next;
        }

        // Collapse self-transitions: keep only true state changes.
        let mut previous = s0;
        let mut retained = Vec::new();
        for (time, state) in times.into_iter().zip(assigned) {
            if state != previous {
                retained.push(CharacterEvent::new(site, time, state));
            }
            previous = state;
        }
        Ok(retained)
    }
}

/// Draws an index proportional to the given non-negative weights.
fn sample_weighted(weights: &[f64], rng: &mut RngHandle) -> usize {
    let total: f64 = weights.iter().sum();
    let mut draw = rng.uniform01() * total;
    for (index, weight) in weights.iter().enumerate() {
        draw -= weight;
        if draw <= 0.0 {
            return index;
        }
    }
    weights.len() - 1
}

impl Proposal for PathUniformizationProposal {
    fn name(&self) -> &'static str {
        "path-uniformization"
    }

    fn targets(&self) -> &[Target] {
        PATH_TARGETS
    }

    fn prepare(&mut self, model: &mut Model, rng: &mut RngHandle) -> Result<(), TreehistError> {
        model.rate.update_matrix();

        self.stored_events.clear();
        self.proposed_events.clear();
        self.stored_ln_prob = 0.0;
        self.proposed_ln_prob = 0.0;

        let pinned_node = self.next_node.take();
        let pinned_sites = self.next_sites.take();
        self.validate_pinned(pinned_node, pinned_sites.as_ref())?;

        self.node = if let Some(node) = pinned_node {
            node
        } else if let Some(node) = self.fixed_node {
            node
        } else {
            ((rng.uniform01() * self.num_nodes as f64) as usize).min(self.num_nodes - 1)
        };

        self.site_set = if let Some(sites) = pinned_sites {
            sites
        } else {
            let mut sites = BTreeSet::new();
            // At least one site is always resampled.
            sites.insert(((rng.uniform01() * self.num_sites as f64) as usize).min(self.num_sites - 1));
            for site in 0..self.num_sites {
                if rng.uniform01() < self.lambda {
                    sites.insert(site);
                }
            }
            sites
        };

        let tree_node = model.tree.node(self.node)?;
        let history = model.histories.history(self.node)?;
        self.stored_events = history.events_at_sites(&self.site_set);
        self.stored_ln_prob = self.compute_ln_proposal(tree_node, history, model.rate.as_ref());
        model.histories.fire_change_event(self.node);
        Ok(())
    }

    fn propose(&mut self, model: &mut Model, rng: &mut RngHandle) -> Result<f64, TreehistError> {
        self.proposed_events.clear();

        let tree_node = model.tree.node(self.node)?.clone();
        let branch_length = match self.effective_branch_length(&tree_node) {
            Some(length) => length,
            // A root branch without a tail has nothing to resample.
            None => return Ok(0.0),
        };

        let endpoint_probs = model.rate.transition_probabilities(branch_length)?;
        let (u_matrix, mu) = model.rate.uniformized_matrix();
        let poisson_mean = mu * branch_length;

        self.dtmc_powers.clear();
        self.dtmc_powers.push(SquareMatrix::identity(u_matrix.size()));

        let (parent_states, child_states) = {
            let history = model.histories.history(self.node)?;
            (
                history.parent_states().to_vec(),
                history.child_states().to_vec(),
            )
        };

        let sites: Vec<usize> = self.site_set.iter().copied().collect();
        for site in sites {
            let s0 = parent_states[site];
            let s1 = child_states[site];
            let endpoint_prob = endpoint_probs.get(s0, s1);
            if endpoint_prob <= 0.0 {
                return Err(TreehistError::Proposal(
                    ErrorInfo::new(
                        "zero-endpoint-probability",
                        "endpoint transition probability is numerically zero",
                    )
                    .with_context("node", self.node.to_string())
                    .with_context("site", site.to_string())
                    .with_context("from", s0.to_string())
                    .with_context("to", s1.to_string())
                    .with_hint("treat as a rejected move; no valid path exists at this scale"),
                ));
            }
            let site_events = self.sample_site_path(
                site,
                s0,
                s1,
                poisson_mean,
                endpoint_prob,
                branch_length,
                &u_matrix,
                rng,
            )?;
            self.proposed_events.extend(site_events);
        }

        // Install the candidate so downstream likelihoods see it.
        model
            .histories
            .history_mut(self.node)?
            .update_history(self.proposed_events.clone(), &self.site_set)?;
        model.histories.fire_change_event(self.node);

        let history = model.histories.history(self.node)?;
        self.proposed_ln_prob = self.compute_ln_proposal(&tree_node, history, model.rate.as_ref());
        Ok(self.stored_ln_prob - self.proposed_ln_prob)
    }

    fn accept(&mut self) {
        self.stored_events.clear();
        self.proposed_events.clear();
    }

    fn reject(&mut self, model: &mut Model) -> Result<(), TreehistError> {
        model
            .histories
            .history_mut(self.node)?
            .update_history(std::mem::take(&mut self.stored_events), &self.site_set)?;
        model.histories.fire_change_event(self.node);
        self.proposed_events.clear();
        Ok(())
    }

    fn tune(&mut self, _acceptance_rate: f64) {
        // The path sampler has no continuous tuning parameter.
    }

    fn parameter_summary(&self) -> String {
        format!("lambda = {}", self.lambda)
    }
}
