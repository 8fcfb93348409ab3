use std::collections::BTreeSet;

use treehist_core::matrix::SquareMatrix;
use treehist_core::rng::RngHandle;
use treehist_model::{BranchHistory, CharacterEvent, GeneratorMatrix, HistoryStore, Tree, TreeNode};
use treehist_moves::{Model, PathProposalConfig, PathUniformizationProposal, Proposal};

fn two_state_model(branch_length: f64) -> Model {
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
            branch_length,
            age: 0.0,
        },
    ])
    .expect("valid tree");

    let mut branch = BranchHistory::new(vec![0, 1, 0], vec![1, 1, 1]).expect("valid endpoints");
    branch
        .update_history(
            vec![
                CharacterEvent::new(0, 0.3, 1),
                CharacterEvent::new(2, 0.2, 1),
                CharacterEvent::new(2, 0.6, 0),
                CharacterEvent::new(2, 0.9, 1),
            ],
            &BTreeSet::from([0, 2]),
        )
        .expect("install events");
    assert!(branch.is_endpoint_consistent());

    let histories = HistoryStore::new(vec![
        BranchHistory::new(vec![0, 0, 0], vec![0, 1, 0]).expect("valid endpoints"),
        branch,
    ])
    .expect("valid store");
    Model::new(tree, Box::new(generator), histories).expect("valid model")
}

#[test]
fn reject_restores_history_bit_exactly() {
    // One substream per repetition, all derived from a single master seed.
    for seed in 0..20u64 {
        let mut model = two_state_model(1.0);
        let mut rng = RngHandle::for_substream(4242, seed);
        let mut proposal =
            PathUniformizationProposal::new(PathProposalConfig::default(), &model)
                .expect("valid proposal");
        proposal.pin_node(1);

        let before = model.histories.history(1).expect("history").clone();

        proposal.prepare(&mut model, &mut rng).expect("prepare");
        proposal.propose(&mut model, &mut rng).expect("propose");
        proposal.reject(&mut model).expect("reject");

        let after = model.histories.history(1).expect("history");
        assert_eq!(after, &before, "seed={seed}");
        assert_eq!(after.events(), before.events(), "seed={seed}");
        assert_eq!(after.parent_states(), before.parent_states());
        assert_eq!(after.child_states(), before.child_states());
    }
}

#[test]
fn reject_restores_untouched_sites_too() {
    let mut model = two_state_model(2.0);
    let mut rng = RngHandle::from_seed(11);
    let mut proposal = PathUniformizationProposal::new(PathProposalConfig::default(), &model)
        .expect("valid proposal");
    proposal.pin_node(1);
    proposal.pin_sites(BTreeSet::from([2]));

    let before = model.histories.history(1).expect("history").clone();
    proposal.prepare(&mut model, &mut rng).expect("prepare");
    proposal.propose(&mut model, &mut rng).expect("propose");

    // Site 0 events must survive the open transaction untouched.
    let mid = model.histories.history(1).expect("history");
    let site0_mid: Vec<_> = mid.events().iter().filter(|e| e.site == 0).collect();
    let site0_before: Vec<_> = before.events().iter().filter(|e| e.site == 0).collect();
    assert_eq!(site0_mid, site0_before);

    proposal.reject(&mut model).expect("reject");
    assert_eq!(model.histories.history(1).expect("history"), &before);
}

#[test]
fn accept_keeps_the_installed_candidate() {
    let mut model = two_state_model(1.5);
    let mut rng = RngHandle::from_seed(3);
    let mut proposal = PathUniformizationProposal::new(PathProposalConfig::default(), &model)
        .expect("valid proposal");
    proposal.pin_node(1);

    proposal.prepare(&mut model, &mut rng).expect("prepare");
    proposal.propose(&mut model, &mut rng).expect("propose");
    let candidate = model.histories.history(1).expect("history").clone();

    proposal.accept();
    assert_eq!(model.histories.history(1).expect("history"), &candidate);
    assert!(candidate.is_endpoint_consistent());
}
