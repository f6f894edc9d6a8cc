// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single unit of work inside a pipeline body.
//!
//! A step is modeled as one closure, `Fn(StepContext<C>) -> StepOutcome<C>`.
//! The four step *kinds* (synchronous computation, promise-returning call,
//! nested pipeline, interpreter-aware function) are not distinct Rust types
//! — they are distinguished entirely by which `StepOutcome` variant the
//! closure returns. A literal nested pipeline is just a step whose closure
//! ignores its input and always returns `StepOutcome::Nested`.

use crate::error::PipelineError;
use crate::id::Ident;
use crate::pipeline::Pipeline;
use crate::resumable::{Block, Resumable};
use crate::value::AnyValue;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// Everything an ordinary (non interpreter-aware) step closure receives.
pub struct StepContext<'a, C> {
    pub value: AnyValue,
    pub context: &'a C,
    pub error: Option<&'a PipelineError>,
}

/// Read-only view of one frame of the live interpreter stack, innermost
/// (currently executing) frame first.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub ident: Ident,
    pub block: Block,
    pub remaining_steps: usize,
    pub value: AnyValue,
}

/// The capability an interpreter-aware ("pipeline-step") function is given:
/// a read of the live stack of resumables, and the ability to replace the
/// currently-executing frame with a freshly rebuilt resumable.
///
/// Defined here, in `loom-core`, and implemented by `loom-engine`'s
/// execution frame so that a step can reach into the interpreter without
/// `loom-core` depending on the engine crate that drives it.
pub trait InterpreterHandle<C> {
    fn frames(&self) -> Vec<FrameView>;
    fn rebuild(&mut self, new_top: Resumable<C>);
}

/// Everything an interpreter-aware step closure receives, in addition to
/// the ordinary step context.
pub struct InterpreterStepContext<'a, C> {
    pub value: AnyValue,
    pub context: &'a C,
    pub error: Option<&'a PipelineError>,
    pub parent: Option<Ident>,
    pub interpreter: &'a mut dyn InterpreterHandle<C>,
}

/// The eventual settlement of a suspended step's promise, including the
/// case where the promise resolves to another pipeline to run in place.
pub enum PromiseOutput<C> {
    /// `None` maps to "undefined → prevValue" per the suspension rule.
    Value(Option<AnyValue>),
    Error(PipelineError),
    Pipeline(Pipeline<C>),
}

pub type StepFuture<C> = Pin<Box<dyn Future<Output = PromiseOutput<C>> + 'static>>;

/// What a step produced, dispatched by the interpreter
pub enum StepOutcome<C> {
    /// `None` means the step produced nil/undefined: the pipeline value is
    /// left unchanged.
    Value(Option<AnyValue>),
    Error(PipelineError),
    /// The cancellation sentinel: terminate immediately, caller sees
    /// cancellation.
    Cancelled,
    /// A step has rewritten the execution stack; resume from here.
    Resumable(Box<Resumable<C>>),
    /// Suspend awaiting this future.
    Promise(StepFuture<C>),
    /// Run this pipeline as a nested instance, then continue with its result.
    Nested(Pipeline<C>),
}

/// What running a nested pipeline to completion handed back to the step
/// that invoked it.
pub enum NestedOutcome {
    Value(AnyValue),
    Error(PipelineError),
    Cancelled,
}

type PlainFn<C> = Rc<dyn Fn(StepContext<C>) -> StepOutcome<C>>;
pub type PipelineStepFn<C> = Rc<dyn Fn(InterpreterStepContext<C>) -> StepOutcome<C>>;

/// One step in a pipeline's `begin`/`rescue`/`finally` block.
pub enum Step<C> {
    Plain(PlainFn<C>),
    Interpreter(PipelineStepFn<C>),
}

// Manual `Clone` so `Step<C>` is cloneable without requiring `C: Clone` — the
// derive macro would add that bound spuriously since `C` only ever appears
// inside an `Rc<dyn Fn(..)>`, which is always cheap to clone regardless.
impl<C> Clone for Step<C> {
    fn clone(&self) -> Self {
        match self {
            Step::Plain(f) => Step::Plain(f.clone()),
            Step::Interpreter(f) => Step::Interpreter(f.clone()),
        }
    }
}

impl<C: 'static> Step<C> {
    pub fn new(f: impl Fn(StepContext<C>) -> StepOutcome<C> + 'static) -> Self {
        Step::Plain(Rc::new(f))
    }

    pub fn interpreter_aware(
        f: impl Fn(InterpreterStepContext<C>) -> StepOutcome<C> + 'static,
    ) -> Self {
        Step::Interpreter(Rc::new(f))
    }

    /// A step that always runs `pipeline` as a nested instance of the
    /// current value, ignoring its own inputs otherwise.
    pub fn nested(pipeline: Pipeline<C>) -> Self {
        Step::Plain(Rc::new(move |_ctx| StepOutcome::Nested(pipeline.clone())))
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
