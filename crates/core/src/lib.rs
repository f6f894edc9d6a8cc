// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! loom-core: data model for the pipeline interpreter.
//!
//! This crate holds everything that can be described without a running
//! event loop: pipeline templates, their concurrency configuration, the
//! dynamically-typed value that flows between steps, and the resumable
//! snapshot of one instance's execution progress. The interpreter, queue
//! manager, and runtime façade that actually drive these types live in
//! `loom-engine`.

pub mod concurrency;
pub mod error;
pub mod id;
pub mod pipeline;
pub mod resumable;
pub mod step;
#[cfg(feature = "test-support")]
pub mod test_support;
pub mod value;

pub use concurrency::{Concurrency, ConcurrencyBehavior, Max};
pub use error::PipelineError;
pub use id::{Ident, IdGen, PipelineId, SequentialIdGen, UuidIdGen};
pub use pipeline::{muted, Body, Pipeline, PipelineConfig, QueueNameSource};
pub use resumable::{Block, CarriedTerminal, ExecState, Resumable};
pub use step::{
    FrameView, InterpreterHandle, InterpreterStepContext, NestedOutcome, PipelineStepFn,
    PromiseOutput, Step, StepContext, StepFuture, StepOutcome,
};
pub use value::{AnyValue, Cancelled, Outcome, CANCELLED};
