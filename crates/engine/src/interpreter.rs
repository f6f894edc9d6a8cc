// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The synchronous step-execution loop: dispatches steps one at a time,
//! switches between `begin`/`rescue`/`finally`, and hands control back to
//! [`crate::runtime::Runtime`] whenever a step suspends.

use crate::registry::Instance;
use crate::runtime::Runtime;
use loom_core::{
    Block, CarriedTerminal, FrameView, InterpreterHandle, InterpreterStepContext, Outcome,
    Pipeline, PipelineError, Resumable, Step, StepContext, StepFuture, StepOutcome,
};
use std::rc::Rc;

/// What a step (or a just-resumed promise) produced, reduced to the three
/// things the interpreter itself needs to react to. A plain `StepOutcome`
/// doubles as this: resuming after a suspension is handled by feeding a
/// synthesized `StepOutcome` into the same dispatch match a freshly-called
/// step would have produced.
pub enum RunResult<C> {
    Terminal(Outcome),
    SuspendedOnStep {
        resumable: Resumable<C>,
        fut: StepFuture<C>,
    },
    SuspendedOnNested {
        resumable: Resumable<C>,
        deferred: crate::registry::DeferredResult,
    },
}

/// How a (re-)entry into the loop should begin: either run the next step
/// normally, or feed in the result of something the instance was previously
/// suspended on.
pub enum Resume<C> {
    Fresh,
    Value(Option<loom_core::AnyValue>),
    Error(PipelineError),
    Nested(Pipeline<C>),
}

/// Drive `resumable` until it terminates or suspends again.
pub fn run<C: 'static>(
    rt: &Rc<Runtime<C>>,
    instance: &Rc<Instance<C>>,
    resumable: Resumable<C>,
    resume: Resume<C>,
) -> RunResult<C> {
    run_inner(rt, instance, unwind_tail_chain(resumable), resume)
}

fn outcome_to_resume<C>(outcome: Outcome) -> Resume<C> {
    match outcome {
        Outcome::Value(v) => Resume::Value(Some(v)),
        Outcome::Error(e) => Resume::Error(e),
        Outcome::Cancelled => unreachable!("cancelled outcomes are handled by the caller"),
    }
}

/// Follow `tail` links outward-to-inward, turning the chain into an explicit
/// stack ordered outermost first, innermost (the frame that actually
/// dispatches next) last.
fn unwind_tail_chain<C>(mut resumable: Resumable<C>) -> Vec<Resumable<C>> {
    let mut stack = Vec::new();
    loop {
        match resumable.tail.take() {
            Some(tail) => {
                stack.push(resumable);
                resumable = *tail;
            }
            None => {
                stack.push(resumable);
                return stack;
            }
        }
    }
}

/// Re-thread a stack (outermost first) back into the single `tail`-linked
/// resumable every other part of the runtime expects to hold.
fn rebuild_tail_chain<C>(mut stack: Vec<Resumable<C>>) -> Resumable<C> {
    let mut current = stack.pop().expect("stack is never empty");
    while let Some(mut outer) = stack.pop() {
        outer.tail = Some(Box::new(current));
        current = outer;
    }
    current
}

/// If the top of the stack carries its own freshly-attached `tail` — set
/// either by a step returning `StepOutcome::Resumable` or by an
/// interpreter-aware step's `rebuild` — unwind it onto the stack so the next
/// dispatch targets the true innermost frame. Checked at the top of every
/// loop iteration, not just once on entry, so a tail attached mid-loop is
/// never silently skipped.
fn flatten_top_tail<C>(stack: &mut Vec<Resumable<C>>) {
    while let Some(top) = stack.last_mut() {
        match top.tail.take() {
            Some(tail) => stack.push(*tail),
            None => break,
        }
    }
}

/// What happens to the whole run once the innermost frame settles: either
/// it was the outermost frame too and the run is over, or an outer frame
/// was waiting on it and resumes with its result.
enum Settle<C> {
    Done(Outcome),
    Continue(Resume<C>),
}

/// Pop the now-terminal innermost frame and decide what comes next. A
/// cancellation always ends the whole run immediately, matching the rule
/// that `finally` never runs once cancellation wins.
fn settle_frame<C>(stack: &mut Vec<Resumable<C>>, outcome: Outcome) -> Settle<C> {
    stack.pop();
    if stack.is_empty() || matches!(outcome, Outcome::Cancelled) {
        Settle::Done(outcome)
    } else {
        Settle::Continue(outcome_to_resume(outcome))
    }
}

/// Drive the stack frame by frame. `stack.last()` is always the
/// currently-dispatching (innermost) frame; frames below it are callers
/// waiting on it via `tail`, per the "tail resumption" rule — a suspended
/// resumable with a non-empty tail runs that tail to completion first and
/// takes its terminal value as its own resumed value.
fn run_inner<C: 'static>(
    rt: &Rc<Runtime<C>>,
    instance: &Rc<Instance<C>>,
    mut stack: Vec<Resumable<C>>,
    mut resume: Resume<C>,
) -> RunResult<C> {
    loop {
        flatten_top_tail(&mut stack);

        if instance.canceller.is_fired() {
            return RunResult::Terminal(Outcome::Cancelled);
        }

        let outcome: StepOutcome<C> = match std::mem::replace(&mut resume, Resume::Fresh) {
            Resume::Value(v) => StepOutcome::Value(v),
            Resume::Error(e) => StepOutcome::Error(e),
            Resume::Nested(p) => StepOutcome::Nested(p),
            Resume::Fresh => {
                let top = stack.last_mut().expect("stack is never empty");
                if top.state.is_exhausted() {
                    match on_block_exhausted(top) {
                        Some(terminal) => match settle_frame(&mut stack, terminal) {
                            Settle::Done(outcome) => return RunResult::Terminal(outcome),
                            Settle::Continue(next) => {
                                resume = next;
                                continue;
                            }
                        },
                        None => continue,
                    }
                }
                let step = match top.state.peek_step() {
                    Some(step) => step,
                    None => continue,
                };
                top.state.advance();
                dispatch_step(rt, instance, &mut stack, &step)
            }
        };

        match outcome {
            StepOutcome::Value(v) => stack.last_mut().expect("stack is never empty").state.apply_produced(v),
            StepOutcome::Error(e) => {
                let top = stack.last_mut().expect("stack is never empty");
                if let Some(terminal) = on_step_error(top, e) {
                    match settle_frame(&mut stack, terminal) {
                        Settle::Done(outcome) => return RunResult::Terminal(outcome),
                        Settle::Continue(next) => resume = next,
                    }
                }
            }
            StepOutcome::Cancelled => return RunResult::Terminal(Outcome::Cancelled),
            StepOutcome::Resumable(new_top) => {
                stack.pop();
                stack.push(*new_top);
            }
            StepOutcome::Promise(fut) => {
                return RunResult::SuspendedOnStep {
                    resumable: rebuild_tail_chain(stack),
                    fut,
                };
            }
            StepOutcome::Nested(pipeline) => {
                let value = stack.last().expect("stack is never empty").state.value.clone();
                match rt.invoke_nested(instance, pipeline, value) {
                    crate::runtime::NestedOutcome::Sync(Outcome::Value(v)) => {
                        stack
                            .last_mut()
                            .expect("stack is never empty")
                            .state
                            .apply_produced(Some(v));
                    }
                    crate::runtime::NestedOutcome::Sync(Outcome::Error(e)) => {
                        let top = stack.last_mut().expect("stack is never empty");
                        if let Some(terminal) = on_step_error(top, e) {
                            match settle_frame(&mut stack, terminal) {
                                Settle::Done(outcome) => return RunResult::Terminal(outcome),
                                Settle::Continue(next) => resume = next,
                            }
                        }
                    }
                    crate::runtime::NestedOutcome::Sync(Outcome::Cancelled) => {
                        return RunResult::Terminal(Outcome::Cancelled);
                    }
                    crate::runtime::NestedOutcome::Pending(deferred) => {
                        return RunResult::SuspendedOnNested {
                            resumable: rebuild_tail_chain(stack),
                            deferred,
                        };
                    }
                    crate::runtime::NestedOutcome::Detached => {
                        // Fire-and-forget: the outer pipeline's value is
                        // unaffected and execution continues immediately.
                        stack
                            .last_mut()
                            .expect("stack is never empty")
                            .state
                            .apply_produced(None);
                    }
                }
            }
        }
    }
}

/// The live execution stack, handed to interpreter-aware steps: a read of
/// every frame from innermost (currently dispatching) to outermost, and the
/// ability to replace the currently-dispatching frame with a freshly
/// rebuilt one. The replacement may itself carry a `tail`, which is
/// unwound onto the stack before the next frame dispatches — this is what
/// makes ancestor-step injection and stale-while-revalidate possible: a
/// step can read the ancestor chain via `frames()` and splice in a
/// synthetic sub-resumable ahead of its own continuation.
struct CurrentFrame<'a, C> {
    stack: &'a mut Vec<Resumable<C>>,
}

impl<'a, C> InterpreterHandle<C> for CurrentFrame<'a, C> {
    fn frames(&self) -> Vec<FrameView> {
        self.stack
            .iter()
            .rev()
            .map(|r| FrameView {
                ident: r.ident.clone(),
                block: r.state.block,
                remaining_steps: r.state.remaining_count(),
                value: r.state.value.clone(),
            })
            .collect()
    }

    fn rebuild(&mut self, new_top: Resumable<C>) {
        self.stack.pop();
        self.stack.push(new_top);
    }
}

fn dispatch_step<C: 'static>(
    rt: &Rc<Runtime<C>>,
    instance: &Rc<Instance<C>>,
    stack: &mut Vec<Resumable<C>>,
    step: &Step<C>,
) -> StepOutcome<C> {
    let top = stack.last().expect("stack is never empty");
    let value = top.state.value.clone();
    let error = top.state.error.clone();
    match step {
        Step::Plain(f) => f(StepContext {
            value,
            context: rt.context(),
            error: error.as_ref(),
        }),
        Step::Interpreter(f) => {
            let parent = instance.parent.clone();
            let mut handle = CurrentFrame { stack };
            f(InterpreterStepContext {
                value,
                context: rt.context(),
                error: error.as_ref(),
                parent,
                interpreter: &mut handle,
            })
        }
    }
}

/// Block-exhaustion rules: `begin`/`rescue` fall through to
/// `finally` if present, else terminate with the current value. `finally`
/// terminates with whatever value or error was carried into it.
fn on_block_exhausted<C>(resumable: &mut Resumable<C>) -> Option<Outcome> {
    match resumable.state.block {
        Block::Begin | Block::Rescue => {
            if resumable.body.finally.is_empty() {
                Some(Outcome::Value(resumable.state.value.clone()))
            } else {
                resumable.carried = Some(CarriedTerminal::Value(resumable.state.value.clone()));
                resumable
                    .state
                    .enter_block(Block::Finally, resumable.body.finally.clone());
                None
            }
        }
        Block::Finally => Some(match resumable.carried.take() {
            Some(CarriedTerminal::Value(v)) => Outcome::Value(v),
            Some(CarriedTerminal::Error(e)) => Outcome::Error(e),
            None => Outcome::Value(resumable.state.value.clone()),
        }),
    }
}

/// Error-dispatch rules: `begin` jumps to `rescue` if present,
/// else `finally` if present, else terminates. `rescue` jumps straight to
/// `finally` (never re-enters rescue) or terminates. `finally` never
/// catches — an error there always terminates immediately.
fn on_step_error<C>(resumable: &mut Resumable<C>, err: PipelineError) -> Option<Outcome> {
    match resumable.state.block {
        Block::Begin if !resumable.body.rescue.is_empty() => {
            resumable.state.error = Some(err);
            resumable
                .state
                .enter_block(Block::Rescue, resumable.body.rescue.clone());
            None
        }
        Block::Begin | Block::Rescue if !resumable.body.finally.is_empty() => {
            resumable.carried = Some(CarriedTerminal::Error(err));
            resumable
                .state
                .enter_block(Block::Finally, resumable.body.finally.clone());
            None
        }
        _ => Some(Outcome::Error(err)),
    }
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
