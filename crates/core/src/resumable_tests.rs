use super::*;
use crate::step::{StepContext, StepOutcome};
use std::rc::Rc;

fn steps() -> Rc<Vec<Step<()>>> {
    Rc::new(vec![
        Step::new(|_ctx: StepContext<()>| StepOutcome::Value(None)),
        Step::new(|_ctx: StepContext<()>| StepOutcome::Value(None)),
    ])
}

fn empty_body() -> Body<()> {
    Body {
        begin: steps(),
        rescue: Rc::new(Vec::new()),
        finally: Rc::new(Vec::new()),
    }
}

#[test]
fn new_exec_state_starts_at_the_first_step_with_equal_value_and_prev_value() {
    let value = AnyValue::new(1);
    let state = ExecState::<()>::new(Block::Begin, steps(), value);
    assert_eq!(state.remaining_count(), 2);
    assert!(!state.is_exhausted());
}

#[test]
fn advancing_past_every_step_marks_the_state_exhausted() {
    let mut state = ExecState::<()>::new(Block::Begin, steps(), AnyValue::unit());
    state.advance();
    state.advance();
    assert!(state.is_exhausted());
    assert_eq!(state.remaining_count(), 0);
}

#[test]
fn apply_produced_none_preserves_the_current_value() {
    let mut state = ExecState::<()>::new(Block::Begin, steps(), AnyValue::new(10));
    state.apply_produced(None);
    assert_eq!(state.value.downcast_ref::<i32>(), Some(&10));
    assert_eq!(state.prev_value.downcast_ref::<i32>(), Some(&10));
}

#[test]
fn apply_produced_some_replaces_the_value_and_remembers_the_previous_one() {
    let mut state = ExecState::<()>::new(Block::Begin, steps(), AnyValue::new(10));
    state.apply_produced(Some(AnyValue::new(11)));
    assert_eq!(state.value.downcast_ref::<i32>(), Some(&11));
    assert_eq!(state.prev_value.downcast_ref::<i32>(), Some(&10));
}

#[test]
fn enter_block_resets_the_cursor_into_the_new_step_list() {
    let mut state = ExecState::<()>::new(Block::Begin, steps(), AnyValue::unit());
    state.advance();
    state.enter_block(Block::Rescue, steps());
    assert_eq!(state.block, Block::Rescue);
    assert_eq!(state.remaining_count(), 2);
}

#[test]
fn splice_remaining_replaces_the_step_list_from_the_current_position() {
    let mut state = ExecState::<()>::new(Block::Begin, steps(), AnyValue::unit());
    state.splice_remaining(vec![Step::new(|_ctx: StepContext<()>| {
        StepOutcome::Value(None)
    })]);
    assert_eq!(state.remaining_count(), 1);
}

#[test]
fn resumable_with_tail_exposes_it() {
    let id = PipelineId::new("p");
    let ident = Ident::new(id.clone(), 0);
    let state = ExecState::<()>::new(Block::Begin, steps(), AnyValue::unit());
    let tail_ident = Ident::new(id.clone(), 1);
    let tail = Resumable::new(
        id.clone(),
        tail_ident,
        PipelineConfig::default(),
        AnyValue::unit(),
        empty_body(),
        state.clone(),
    );
    let head = Resumable::new(
        id,
        ident,
        PipelineConfig::default(),
        AnyValue::unit(),
        empty_body(),
        state,
    )
    .with_tail(tail);
    assert!(head.tail.is_some());
}
