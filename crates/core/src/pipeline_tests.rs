use super::*;
use crate::step::{StepContext, StepOutcome};

fn noop_pipeline() -> Pipeline<()> {
    Pipeline::new(vec![Step::new(|_ctx: StepContext<()>| {
        StepOutcome::Value(None)
    })])
}

#[test]
fn new_pipeline_has_no_rescue_or_finally() {
    let p = noop_pipeline();
    assert!(!p.has_rescue());
    assert!(!p.has_finally());
}

#[test]
fn with_blocks_tracks_which_blocks_are_present() {
    let p: Pipeline<()> = Pipeline::with_blocks(
        vec![Step::new(|_ctx| StepOutcome::Value(None))],
        vec![Step::new(|_ctx| StepOutcome::Value(None))],
        vec![],
    );
    assert!(p.has_rescue());
    assert!(!p.has_finally());
}

#[test]
fn builder_combinators_set_queue_config() {
    let p = noop_pipeline()
        .set_queue("checkout")
        .restartable(1)
        .use_existing()
        .detached(true)
        .cancel_on_shutdown(false);

    assert!(matches!(
        p.config.queue_name,
        Some(QueueNameSource::Fixed(ref n)) if &**n == "checkout"
    ));
    assert_eq!(p.config.concurrency, crate::concurrency::Concurrency::restartable(1));
    assert!(p.config.use_existing);
    assert!(p.config.is_detached);
    assert!(!p.config.cancel_on_shutdown);
}

#[test]
fn set_queue_fn_computes_the_name_from_args() {
    let p = noop_pipeline().set_queue_fn(|args| {
        let s: &String = args.downcast_ref().expect("string args");
        format!("user:{s}")
    });
    let Some(QueueNameSource::FromArgs(f)) = p.config.queue_name else {
        panic!("expected a FromArgs queue name source");
    };
    assert_eq!(f(&AnyValue::new("alice".to_string())), "user:alice");
}

#[test]
fn cloning_a_pipeline_shares_its_id() {
    let p = noop_pipeline();
    let clone = p.clone();
    assert_eq!(p.id, clone.id);
}

#[test]
fn muted_restores_the_outer_value_after_running_the_inner_pipeline() {
    let inner = noop_pipeline();
    let outer = muted(inner);
    // begin = [save, nested(inner), restore]
    assert_eq!(outer.body.begin.len(), 3);
}
