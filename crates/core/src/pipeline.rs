// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline template: an immutable description of a computation as three
//! ordered step lists plus concurrency configuration, and the builder
//! combinators that transform one pipeline value into another.

use crate::concurrency::Concurrency;
use crate::id::PipelineId;
use crate::step::Step;
use crate::value::AnyValue;
use std::cell::RefCell;
use std::rc::Rc;

/// Where a queue's name comes from: a fixed string, or computed from the
/// invocation args.
#[derive(Clone)]
pub enum QueueNameSource {
    Fixed(Rc<str>),
    FromArgs(Rc<dyn Fn(&AnyValue) -> String>),
}

impl QueueNameSource {
    pub fn resolve(&self, args: &AnyValue) -> String {
        match self {
            QueueNameSource::Fixed(name) => name.to_string(),
            QueueNameSource::FromArgs(f) => f(args),
        }
    }
}

/// Per-pipeline configuration.
#[derive(Clone)]
pub struct PipelineConfig {
    /// Unset until either the builder sets it explicitly or registration
    /// defaults it to the registration key.
    pub queue_name: Option<QueueNameSource>,
    pub concurrency: Concurrency,
    pub use_existing: bool,
    pub is_detached: bool,
    pub cancel_on_shutdown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_name: None,
            concurrency: Concurrency::default(),
            use_existing: false,
            is_detached: false,
            cancel_on_shutdown: true,
        }
    }
}

/// Three ordered step lists making up a pipeline body.
pub struct Body<C> {
    pub begin: Rc<Vec<Step<C>>>,
    pub rescue: Rc<Vec<Step<C>>>,
    pub finally: Rc<Vec<Step<C>>>,
}

impl<C> Clone for Body<C> {
    fn clone(&self) -> Self {
        Self {
            begin: self.begin.clone(),
            rescue: self.rescue.clone(),
            finally: self.finally.clone(),
        }
    }
}

/// An immutable pipeline template.
pub struct Pipeline<C> {
    pub id: PipelineId,
    pub body: Body<C>,
    pub config: PipelineConfig,
}

impl<C> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            body: self.body.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C: 'static> Pipeline<C> {
    /// Build a pipeline with only a `begin` block.
    pub fn new(begin: Vec<Step<C>>) -> Self {
        Self::with_blocks(begin, Vec::new(), Vec::new())
    }

    pub fn with_blocks(begin: Vec<Step<C>>, rescue: Vec<Step<C>>, finally: Vec<Step<C>>) -> Self {
        Self {
            id: PipelineId::new(uuid::Uuid::new_v4().to_string()),
            body: Body {
                begin: Rc::new(begin),
                rescue: Rc::new(rescue),
                finally: Rc::new(finally),
            },
            config: PipelineConfig::default(),
        }
    }

    pub fn has_rescue(&self) -> bool {
        !self.body.rescue.is_empty()
    }

    pub fn has_finally(&self) -> bool {
        !self.body.finally.is_empty()
    }

    // --- builder combinators ---

    pub fn set_queue(mut self, name: impl Into<String>) -> Self {
        self.config.queue_name = Some(QueueNameSource::Fixed(Rc::from(name.into())));
        self
    }

    pub fn set_queue_fn(mut self, f: impl Fn(&AnyValue) -> String + 'static) -> Self {
        self.config.queue_name = Some(QueueNameSource::FromArgs(Rc::new(f)));
        self
    }

    pub fn use_existing(mut self) -> Self {
        self.config.use_existing = true;
        self
    }

    pub fn restartable(mut self, max: usize) -> Self {
        self.config.concurrency = Concurrency::restartable(max);
        self
    }

    pub fn enqueued(mut self, max: usize) -> Self {
        self.config.concurrency = Concurrency::enqueued(max);
        self
    }

    pub fn dropping(mut self, max: usize) -> Self {
        self.config.concurrency = Concurrency::dropping(max);
        self
    }

    pub fn keep_latest(mut self, max: usize) -> Self {
        self.config.concurrency = Concurrency::keep_latest(max);
        self
    }

    pub fn cancel_on_shutdown(mut self, flag: bool) -> Self {
        self.config.cancel_on_shutdown = flag;
        self
    }

    pub fn detached(mut self, flag: bool) -> Self {
        self.config.is_detached = flag;
        self
    }
}

/// `muted(p)`: invoke `p` with the current value, then resume with the
/// original value unchanged — implemented by wrapping, not by any
/// language-level scoping trick.
pub fn muted<C: 'static>(p: Pipeline<C>) -> Pipeline<C> {
    let original: Rc<RefCell<Option<AnyValue>>> = Rc::new(RefCell::new(None));

    let save = {
        let original = original.clone();
        Step::new(move |ctx: crate::step::StepContext<C>| {
            *original.borrow_mut() = Some(ctx.value);
            crate::step::StepOutcome::Value(None)
        })
    };
    let run = Step::nested(p);
    let restore = Step::new(move |_ctx: crate::step::StepContext<C>| {
        crate::step::StepOutcome::Value(original.borrow_mut().take())
    });

    Pipeline::new(vec![save, run, restore])
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
