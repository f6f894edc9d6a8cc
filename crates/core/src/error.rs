// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-visible pipeline error taxonomy.
//!
//! Distinct from `loom_engine::RuntimeError`, which additionally carries
//! configuration errors (queue concurrency mismatches, unknown pipeline
//! references) that are thrown synchronously at `invoke` time and never
//! flow through a `rescue`/`finally` block.

use crate::value::AnyValue;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
enum ErrorKind {
    /// A step threw, or its promise rejected with a real error.
    #[error("{0}")]
    Step(#[source] Box<dyn std::error::Error>),
    /// A step's promise rejected with a non-error value, wrapped as-is.
    #[error("Unknown Error")]
    Unknown(AnyValue),
    /// An error raised by the interpreter itself (e.g. a `finally` block
    /// that both errors and is already unwinding another error).
    #[error("{0}")]
    Message(String),
}

struct Inner {
    kind: ErrorKind,
    /// Guards `error_reporter` invocation to at-most-once per originating
    /// error, regardless of whether it escapes synchronously or after a
    /// suspension.
    reported: Cell<bool>,
}

/// A pipeline step or interpreter error. Cheaply cloneable (`Rc`-shared) so
/// the same error can sit in a `rescue` block's error slot and, if it
/// escapes, also reach the runtime's error reporter without re-boxing.
#[derive(Clone)]
pub struct PipelineError(Rc<Inner>);

impl PipelineError {
    pub fn from_step(err: Box<dyn std::error::Error>) -> Self {
        Self(Rc::new(Inner {
            kind: ErrorKind::Step(err),
            reported: Cell::new(false),
        }))
    }

    /// Wrap a non-error promise rejection per the "Unknown Error" rule.
    pub fn unknown(value: AnyValue) -> Self {
        Self(Rc::new(Inner {
            kind: ErrorKind::Unknown(value),
            reported: Cell::new(false),
        }))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self(Rc::new(Inner {
            kind: ErrorKind::Message(msg.into()),
            reported: Cell::new(false),
        }))
    }

    /// Mark this error as reported. Returns `true` the first time it is
    /// called for a given error, `false` on every subsequent call — callers
    /// use this to guarantee `error_reporter` fires at most once.
    pub fn mark_reported(&self) -> bool {
        if self.0.reported.get() {
            false
        } else {
            self.0.reported.set(true);
            true
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.0.kind, ErrorKind::Unknown(_))
    }
}

impl fmt::Debug for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipelineError({:?})", self.0.kind)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.kind)
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
