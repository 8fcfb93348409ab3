use std::collections::BTreeSet;

use treehist_core::matrix::SquareMatrix;
use treehist_core::rng::RngHandle;
use treehist_core::stats::poisson_pmf;
use treehist_model::{BranchHistory, GeneratorMatrix, HistoryStore, Tree, TreeNode};
use treehist_moves::{Model, PathProposalConfig, PathUniformizationProposal, Proposal};

fn self_loop_model(length: f64) -> Model {
    let rates = SquareMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).expect("square");
    let generator = GeneratorMatrix::new(rates).expect("valid generator");
    let tree = Tree::new(vec![
        TreeNode {
            index: 0,
            parent: None,
            branch_length: 0.0,
            age: 1.0,
        },
        TreeNode {
            index: 1,
            parent: Some(0),
            branch_length: length,
            age: 0.0,
        },
    ])
    .expect("valid tree");
    let histories = HistoryStore::new(vec![
        BranchHistory::new(vec![0], vec![0]).expect("valid endpoints"),
        BranchHistory::new(vec![0], vec![0]).expect("valid endpoints"),
    ])
    .expect("valid store");
    Model::new(tree, Box::new(generator), histories).expect("valid model")
}

#[test]
fn zero_event_fraction_matches_the_conditioned_mass() {
    // Q = [[-1,1],[1,-1]], s0 = s1 = 0, L = 1. The self transition
    // probability has the closed form P_self(L) = (1 + e^{-2L}) / 2, and the
    // endpoint-conditioned probability of a zero-jump path is
    // Poisson(mu L, 0) / P_self(L) with mu = 1.
    let length: f64 = 1.0;
    let p_self = 0.5 * (1.0 + (-2.0 * length).exp());
    let expected = poisson_pmf(length, 0) / p_self;

    let mut model = self_loop_model(length);
    // Cross-check the closed form against the rate provider.
    let p = model
        .rate
        .transition_probabilities(length)
        .expect("transition probabilities");
    assert!((p.get(0, 0) - p_self).abs() < 1e-12);

    let mut rng = RngHandle::from_seed(2024);
    let mut proposal = PathUniformizationProposal::new(PathProposalConfig::default(), &model)
        .expect("valid proposal");

    let draws = 10_000usize;
    let mut zero_event_paths = 0usize;
    for _ in 0..draws {
        proposal.pin_node(1);
        proposal.pin_sites(BTreeSet::from([0]));
        proposal.prepare(&mut model, &mut rng).expect("prepare");
        proposal.propose(&mut model, &mut rng).expect("propose");
        if model
            .histories
            .history(1)
            .expect("history")
            .events()
            .is_empty()
        {
            zero_event_paths += 1;
        }
        proposal.accept();
    }

    let fraction = zero_event_paths as f64 / draws as f64;
    // Three-sigma band for a binomial with p ~ 0.65 over 10k draws.
    let sigma = (expected * (1.0 - expected) / draws as f64).sqrt();
    assert!(
        (fraction - expected).abs() < 3.0 * sigma + 1e-3,
        "fraction={fraction} expected={expected}"
    );
}

#[test]
fn self_loop_paths_always_have_an_even_number_of_changes() {
    // With a two-state generator every retained event flips the state, so a
    // path conditioned on identical endpoints keeps an even event count.
    let mut model = self_loop_model(2.0);
    let mut rng = RngHandle::from_seed(7);
    let mut proposal = PathUniformizationProposal::new(PathProposalConfig::default(), &model)
        .expect("valid proposal");
    for _ in 0..500 {
        proposal.pin_node(1);
        proposal.pin_sites(BTreeSet::from([0]));
        proposal.prepare(&mut model, &mut rng).expect("prepare");
        proposal.propose(&mut model, &mut rng).expect("propose");
        let events = model.histories.history(1).expect("history").events().len();
        assert_eq!(events % 2, 0);
        proposal.accept();
    }
}
