use super::*;
use std::fmt;

#[derive(Debug)]
struct Boom;

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom")
    }
}

impl std::error::Error for Boom {}

#[test]
fn step_error_displays_the_wrapped_error() {
    let err = PipelineError::from_step(Box::new(Boom));
    assert_eq!(err.to_string(), "boom");
}

#[test]
fn unknown_rejection_is_wrapped_per_the_unknown_error_rule() {
    let err = PipelineError::unknown(AnyValue::new("just a string"));
    assert!(err.is_unknown());
    assert_eq!(err.to_string(), "Unknown Error");
}

#[test]
fn mark_reported_fires_exactly_once() {
    let err = PipelineError::message("escaped");
    assert!(err.mark_reported());
    assert!(!err.mark_reported());
    assert!(!err.mark_reported());
}

#[test]
fn cloned_errors_share_the_reported_flag() {
    let err = PipelineError::message("escaped");
    let clone = err.clone();
    assert!(err.mark_reported());
    // The clone sees the same underlying flag: a rescue's copy of the error
    // and the one that ultimately escapes to the reporter must not double-report.
    assert!(!clone.mark_reported());
}
