use super::*;

#[test]
fn unknown_pipeline_mentions_the_key() {
    let err = RuntimeError::UnknownPipeline("charge-card".into());
    assert!(err.to_string().contains("charge-card"));
}

#[test]
fn concurrency_mismatch_mentions_the_queue() {
    let err = RuntimeError::ConcurrencyMismatch {
        queue: "billing".into(),
    };
    assert!(err.to_string().contains("billing"));
}
