// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors the runtime raises synchronously at call time — distinct from
//! [`loom_core::PipelineError`], which flows through a pipeline's own
//! `rescue`/`finally` blocks and never reaches a caller directly.

use thiserror::Error;

/// Errors surfaced by [`crate::Runtime`] itself rather than by a pipeline's
/// own steps.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no pipeline registered under key {0:?}")]
    UnknownPipeline(String),

    #[error("queue {queue:?} is already running with a different concurrency configuration")]
    ConcurrencyMismatch { queue: String },

    #[error("ident {0} has no live instance")]
    UnknownIdent(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
