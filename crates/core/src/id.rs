// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers: pipeline ids, fresh instance tokens, and the `(pipelineId, token)`
//! pair this runtime calls an *ident*.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub std::rc::Rc<str>);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(std::rc::Rc::from(id.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Opaque unique identifier of a pipeline template, assigned at construction.
    pub struct PipelineId;
}

/// Generates fresh unique tokens for instance idents.
///
/// Not `Send`/`Sync` — the runtime is single-threaded cooperative, so there is
/// never a need to generate idents from more than one place at once.
pub trait IdGen {
    fn next_token(&self) -> u64;
}

/// Atomically-increasing token generator backed by a UUID-seeded prefix.
///
/// The UUID only seeds the generator's identity (useful when correlating logs
/// across process restarts); the actual tokens handed out are a cheap counter,
/// since the only requirement is runtime-wide uniqueness, not unguessability.
pub struct UuidIdGen {
    epoch: Rc<str>,
    counter: Cell<u64>,
}

impl UuidIdGen {
    pub fn new() -> Self {
        Self {
            epoch: Rc::from(uuid::Uuid::new_v4().to_string()),
            counter: Cell::new(0),
        }
    }

    /// Stable identity for this generator, exposed for log correlation.
    pub fn epoch(&self) -> &str {
        &self.epoch
    }
}

impl Default for UuidIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for UuidIdGen {
    fn next_token(&self) -> u64 {
        let t = self.counter.get();
        self.counter.set(t + 1);
        t
    }
}

/// Deterministic generator for tests: tokens are `0, 1, 2, ...`.
#[derive(Default)]
pub struct SequentialIdGen {
    counter: Cell<u64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGen for SequentialIdGen {
    fn next_token(&self) -> u64 {
        let t = self.counter.get();
        self.counter.set(t + 1);
        t
    }
}

/// Runtime-wide unique identifier of one pipeline instance: the pipeline's id
/// paired with a fresh token from the runtime's `IdGen`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub pipeline_id: PipelineId,
    pub token: u64,
}

impl Ident {
    pub fn new(pipeline_id: PipelineId, token: u64) -> Self {
        Self { pipeline_id, token }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pipeline_id, self.token)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
