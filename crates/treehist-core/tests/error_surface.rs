use treehist_core::errors::{ErrorInfo, TreehistError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("node", "3")
        .with_context("site", "12")
}

#[test]
fn config_error_surface() {
    let err = TreehistError::Config(sample_info("dimension-mismatch", "generator size"));
    assert_eq!(err.info().code, "dimension-mismatch");
    assert!(err.info().context.contains_key("node"));
}

#[test]
fn rate_error_surface() {
    let err = TreehistError::Rate(sample_info("negative-rate", "off-diagonal below zero"));
    assert_eq!(err.info().code, "negative-rate");
    assert!(err.info().context.contains_key("site"));
}

#[test]
fn history_error_surface() {
    let err = TreehistError::History(sample_info("site-out-of-range", "bad site index"));
    assert_eq!(err.info().code, "site-out-of-range");
}

#[test]
fn proposal_error_surface() {
    let err = TreehistError::Proposal(
        sample_info("max-jumps-exceeded", "uniformization bound hit").with_hint("raise max_jumps"),
    );
    assert_eq!(err.info().code, "max-jumps-exceeded");
    assert!(err.to_string().contains("max-jumps-exceeded"));
    assert!(err.to_string().contains("hint"));
}

#[test]
fn errors_round_trip_json() {
    let err = TreehistError::Proposal(sample_info("zero-endpoint-probability", "degenerate"));
    let json = serde_json::to_string(&err).expect("serialize");
    let decoded: TreehistError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}
