use treehist_core::matrix::SquareMatrix;
use treehist_model::{GeneratorMatrix, RateProvider};

fn symmetric_two_state() -> GeneratorMatrix {
    let rates = SquareMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).expect("square");
    GeneratorMatrix::new(rates).expect("valid generator")
}

#[test]
fn diagonals_are_recomputed_from_off_diagonal_rates() {
    let generator = symmetric_two_state();
    assert_eq!(generator.rate(0, 0), -1.0);
    assert_eq!(generator.rate(1, 1), -1.0);
    assert_eq!(generator.dominating_rate(), 1.0);
}

#[test]
fn negative_off_diagonals_are_rejected() {
    let rates = SquareMatrix::from_rows(vec![vec![0.0, -0.5], vec![1.0, 0.0]]).expect("square");
    let err = GeneratorMatrix::new(rates).unwrap_err();
    assert_eq!(err.info().code, "negative-rate");
}

#[test]
fn single_state_generator_is_rejected() {
    let rates = SquareMatrix::from_rows(vec![vec![0.0]]).expect("square");
    let err = GeneratorMatrix::new(rates).unwrap_err();
    assert_eq!(err.info().code, "too-few-states");
}

#[test]
fn transition_probabilities_match_closed_form() {
    let generator = symmetric_two_state();
    let p = generator.transition_probabilities(1.0).expect("expm");
    let self_prob = 0.5 * (1.0 + (-2.0f64).exp());
    assert!((p.get(0, 0) - self_prob).abs() < 1e-12);
    assert!((p.get(0, 1) - (1.0 - self_prob)).abs() < 1e-12);
}

#[test]
fn zero_generator_has_identity_transition_probabilities() {
    let generator = GeneratorMatrix::new(SquareMatrix::zeros(3)).expect("valid generator");
    assert_eq!(generator.dominating_rate(), 0.0);
    let p = generator.transition_probabilities(2.0).expect("expm");
    assert_eq!(p, SquareMatrix::identity(3));
    let (u, mu) = generator.uniformized_matrix();
    assert_eq!(mu, 0.0);
    assert_eq!(u, SquareMatrix::identity(3));
}

#[test]
fn edits_require_update_matrix_before_use() {
    let mut generator = symmetric_two_state();
    generator.set_rate(0, 1, 4.0).expect("edit rate");
    assert!(generator.is_stale());
    let err = generator.transition_probabilities(1.0).unwrap_err();
    assert_eq!(err.info().code, "stale-generator");

    generator.update_matrix();
    assert!(!generator.is_stale());
    assert_eq!(generator.rate(0, 0), -4.0);
    assert!(generator.transition_probabilities(1.0).is_ok());
}

#[test]
fn diagonal_edits_are_refused() {
    let mut generator = symmetric_two_state();
    let err = generator.set_rate(1, 1, 0.0).unwrap_err();
    assert_eq!(err.info().code, "diagonal-edit");
}
