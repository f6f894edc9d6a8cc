// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! loom-engine: the single-threaded cooperative interpreter that drives
//! `loom-core` pipeline templates to completion.
//!
//! Everything here assumes it runs inside a `tokio::task::LocalSet` —
//! suspended steps resume via `tokio::task::spawn_local`, and instance
//! state is `Rc`/`RefCell`, never `Arc`/`Mutex`, since at most one
//! resumable is ever executing at a time.

mod cancellation;
mod error;
mod helpers;
mod interpreter;
mod queue;
mod registry;
mod runtime;

pub use cancellation::Canceller;
pub use error::RuntimeError;
pub use helpers::{reset_ref, update_ref, Ref};
pub use queue::{Admission, Queue};
pub use registry::{
    deferred_pair, ActiveConfig, ActiveInstance, DeferredResult, Instance, InstanceState, Registry,
};
pub use runtime::{Invocation, Runtime};
