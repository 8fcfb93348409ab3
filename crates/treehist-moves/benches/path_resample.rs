use criterion::{criterion_group, criterion_main, Criterion};
use treehist_core::matrix::SquareMatrix;
use treehist_core::rng::RngHandle;
use treehist_model::{BranchHistory, GeneratorMatrix, HistoryStore, Tree, TreeNode};
use treehist_moves::{Model, PathProposalConfig, PathUniformizationProposal, Proposal};

fn sample_model(num_sites: usize) -> Model {
    let rates = SquareMatrix::from_rows(vec![
        vec![0.0, 0.5, 1.0, 0.2],
        vec![0.5, 0.0, 0.3, 0.9],
        vec![1.0, 0.3, 0.0, 0.4],
        vec![0.2, 0.9, 0.4, 0.0],
    ])
    .expect("square");
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
            branch_length: 0.9,
            age: 0.0,
        },
    ])
    .expect("valid tree");
    let parent: Vec<usize> = (0..num_sites).map(|site| site % 4).collect();
    let child: Vec<usize> = (0..num_sites).map(|site| (site + 1) % 4).collect();
    let histories = HistoryStore::new(vec![
        BranchHistory::new(vec![0; num_sites], vec![0; num_sites]).expect("valid endpoints"),
        BranchHistory::new(parent, child).expect("valid endpoints"),
    ])
    .expect("valid store");
    Model::new(tree, Box::new(generator), histories).expect("valid model")
}

fn bench_resample(c: &mut Criterion) {
    let mut model = sample_model(64);
    let mut rng = RngHandle::from_seed(42);
    let mut proposal = PathUniformizationProposal::new(
        PathProposalConfig {
            lambda: 0.25,
            node: Some(1),
            ..PathProposalConfig::default()
        },
        &model,
    )
    .expect("valid proposal");

    c.bench_function("path_resample_64_sites", |b| {
        b.iter(|| {
            proposal.prepare(&mut model, &mut rng).expect("prepare");
            proposal.propose(&mut model, &mut rng).expect("propose");
            proposal.accept();
        })
    });
}

criterion_group!(benches, bench_resample);
criterion_main!(benches);
