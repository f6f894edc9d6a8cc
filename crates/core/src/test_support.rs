// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for other crates' test suites, enabled by the
//! `test-support` feature so `loom-engine` and the workspace-level scenario
//! tests don't each re-derive the same handful of trivial steps.

use crate::error::PipelineError;
use crate::step::{Step, StepContext, StepOutcome};
use crate::value::AnyValue;

/// A step that replaces the value with `v`, ignoring its input.
pub fn always<C: 'static>(v: i64) -> Step<C> {
    Step::new(move |_ctx: StepContext<C>| StepOutcome::Value(Some(AnyValue::new(v))))
}

/// A step that appends `v` to an `i64` input, passing through on type
/// mismatch.
pub fn add<C: 'static>(v: i64) -> Step<C> {
    Step::new(move |ctx: StepContext<C>| match ctx.value.downcast_ref::<i64>() {
        Some(n) => StepOutcome::Value(Some(AnyValue::new(n + v))),
        None => StepOutcome::Value(None),
    })
}

/// A step that unconditionally raises `message` as a step error.
pub fn always_error<C: 'static>(message: &'static str) -> Step<C> {
    Step::new(move |_ctx: StepContext<C>| StepOutcome::Error(PipelineError::message(message)))
}

/// A step that unconditionally returns the cancellation sentinel.
pub fn always_cancel<C: 'static>() -> Step<C> {
    Step::new(|_ctx: StepContext<C>| StepOutcome::Cancelled)
}
