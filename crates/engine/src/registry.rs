// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live instance bookkeeping: the set of in-flight pipeline instances, their
//! parent/child relationships, and the deferred result each caller awaits.

use crate::cancellation::Canceller;
use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use indexmap::IndexSet;
use loom_core::{AnyValue, Ident, Outcome, Resumable};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::oneshot;

/// A cloneable, multiple-observer future that resolves to an instance's
/// terminal outcome. Built from a [`oneshot::channel`] so the runtime can
/// settle it exactly once from wherever an instance happens to terminate,
/// and wrapped in [`Shared`] so `useExisting` callers and the original
/// invoker can all await the same completion.
pub type DeferredResult = Shared<LocalBoxFuture<'static, Outcome>>;

/// Build a settle handle and the deferred future every observer awaits. If
/// the sender is dropped without sending (a bug, not a normal runtime path)
/// observers see `Outcome::Cancelled` rather than hanging forever.
pub fn deferred_pair() -> (oneshot::Sender<Outcome>, DeferredResult) {
    let (tx, rx) = oneshot::channel::<Outcome>();
    let fut: LocalBoxFuture<'static, Outcome> =
        async move { rx.await.unwrap_or(Outcome::Cancelled) }.boxed_local();
    (tx, fut.shared())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Admitted into a queue but not yet running (enqueued or keepLatest's
    /// single pending slot).
    Pending,
    Running,
    /// Settled, but still holds live (non-detached) children; removal from
    /// the registry and its queue is deferred until the last child drains.
    WaitingChildren,
    Cancelled,
}

/// One live pipeline instance.
pub struct Instance<C> {
    pub ident: Ident,
    pub queue_name: String,
    pub pipeline_key: Option<String>,
    pub args: AnyValue,
    pub state: Cell<InstanceState>,
    pub parent: Option<Ident>,
    pub children: RefCell<IndexSet<Ident>>,
    pub is_detached: bool,
    pub cancel_on_shutdown: bool,
    pub canceller: Canceller,
    /// Set once `drive()` has been called for the first time; distinguishes
    /// a still-pending instance (no task is watching its canceller yet)
    /// from a running/suspended one (cancellation must be observed async).
    pub driving: Cell<bool>,
    pub settle: RefCell<Option<oneshot::Sender<Outcome>>>,
    pub deferred: DeferredResult,
    pub resumable: RefCell<Option<Resumable<C>>>,
}

/// The full set of currently live instances, keyed by ident.
pub struct Registry<C> {
    instances: RefCell<HashMap<Ident, Rc<Instance<C>>>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            instances: RefCell::new(HashMap::new()),
        }
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance: Rc<Instance<C>>) {
        self.instances
            .borrow_mut()
            .insert(instance.ident.clone(), instance);
    }

    pub fn get(&self, ident: &Ident) -> Option<Rc<Instance<C>>> {
        self.instances.borrow().get(ident).cloned()
    }

    pub fn remove(&self, ident: &Ident) -> Option<Rc<Instance<C>>> {
        self.instances.borrow_mut().remove(ident)
    }

    pub fn len(&self) -> usize {
        self.instances.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.borrow().is_empty()
    }

    pub fn all(&self) -> Vec<Rc<Instance<C>>> {
        self.instances.borrow().values().cloned().collect()
    }

    /// Live, non-detached instances in the same queue, under the same
    /// registration key, invoked with equal args — the candidate set for
    /// `useExisting`, which reuses an in-flight instance only when both the
    /// `(id, args)` pair matches.
    pub fn in_queue(&self, queue_name: &str, pipeline_key: &str, args: &AnyValue) -> Vec<Rc<Instance<C>>> {
        self.instances
            .borrow()
            .values()
            .filter(|i| {
                i.queue_name == queue_name
                    && i.pipeline_key.as_deref() == Some(pipeline_key)
                    && i.args == *args
            })
            .cloned()
            .collect()
    }
}

/// A snapshot entry for one active instance, as returned by
/// [`crate::Runtime::get_active`].
#[derive(Debug, Clone)]
pub struct ActiveInstance {
    pub ident: Ident,
    pub state: InstanceState,
    pub args: AnyValue,
    pub config: ActiveConfig,
}

/// The subset of a pipeline's configuration worth presenting in an active-
/// instance snapshot. `PipelineConfig` itself isn't cleanly presentable as a
/// whole (its `queue_name` carries an `Rc<dyn Fn>` for the `FromArgs` case),
/// so this mirrors only the fields that are plain data.
#[derive(Debug, Clone, Copy)]
pub struct ActiveConfig {
    pub concurrency: loom_core::Concurrency,
    pub is_detached: bool,
    pub cancel_on_shutdown: bool,
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
