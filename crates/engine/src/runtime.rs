// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime façade: pipeline registration, invocation, structured
//! cancellation, and the single-threaded cooperative drive loop that keeps
//! every live instance moving.
//!
//! `Runtime<C>` is driven from inside a `tokio::task::LocalSet` — it
//! schedules continuations with `tokio::task::spawn_local`, so nothing here
//! is `Send`, and nothing needs to be: there is never more than one
//! resumable actually executing at a time.

use crate::cancellation::Canceller;
use crate::error::RuntimeError;
use crate::interpreter::{self, Resume, RunResult};
use crate::queue::{Admission, Queue};
use crate::registry::{ActiveConfig, ActiveInstance, DeferredResult, Instance, InstanceState, Registry};
use futures_util::future::FutureExt;
use indexmap::IndexSet;
use loom_core::{
    AnyValue, Body, ExecState, Ident, IdGen, Outcome, Pipeline, PipelineError, Resumable,
    StepFuture, UuidIdGen,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// What invoking a pipeline hands back to its caller: either the terminal
/// outcome (the synchronous fast path — no step ever suspended), or a
/// future every observer of this instance can await.
pub enum Invocation {
    Ready(Outcome),
    Pending(DeferredResult),
}

impl Invocation {
    /// Await to completion regardless of which variant this is.
    pub async fn outcome(self) -> Outcome {
        match self {
            Invocation::Ready(outcome) => outcome,
            Invocation::Pending(deferred) => deferred.await,
        }
    }
}

/// What running a nested pipeline handed back to the step that invoked it.
pub(crate) enum NestedOutcome {
    Sync(Outcome),
    Pending(DeferredResult),
    /// The nested pipeline was `detached`: it runs independently and the
    /// invoking step is never linked to its completion.
    Detached,
}

pub struct Runtime<C> {
    context: C,
    id_gen: Box<dyn IdGen>,
    pipelines: RefCell<HashMap<String, Pipeline<C>>>,
    queues: RefCell<HashMap<String, Queue>>,
    registry: Registry<C>,
    error_reporter: RefCell<Option<Box<dyn Fn(&PipelineError)>>>,
    cancel_listeners: RefCell<Vec<Box<dyn Fn(&Ident)>>>,
    stopped: Cell<bool>,
    transact_depth: Cell<u32>,
}

impl<C: 'static> Runtime<C> {
    pub fn new(context: C) -> Rc<Self> {
        Self::with_id_gen(context, Box::new(UuidIdGen::new()))
    }

    pub fn with_id_gen(context: C, id_gen: Box<dyn IdGen>) -> Rc<Self> {
        Rc::new(Self {
            context,
            id_gen,
            pipelines: RefCell::new(HashMap::new()),
            queues: RefCell::new(HashMap::new()),
            registry: Registry::new(),
            error_reporter: RefCell::new(None),
            cancel_listeners: RefCell::new(Vec::new()),
            stopped: Cell::new(false),
            transact_depth: Cell::new(0),
        })
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    // --- registration ---

    /// Register a pipeline under `key`. If the pipeline has no explicit
    /// queue name, registration defaults it to `key`.
    pub fn register(&self, key: impl Into<String>, mut pipeline: Pipeline<C>) {
        let key = key.into();
        if pipeline.config.queue_name.is_none() {
            pipeline = pipeline.set_queue(key.clone());
        }
        self.pipelines.borrow_mut().insert(key, pipeline);
    }

    pub fn has_pipeline(&self, key: &str) -> bool {
        self.pipelines.borrow().contains_key(key)
    }

    // --- introspection ---

    /// Snapshot of every live instance, grouped by queue name.
    pub fn get_active(&self) -> HashMap<String, HashMap<Ident, ActiveInstance>> {
        let queues = self.queues.borrow();
        let mut out: HashMap<String, HashMap<Ident, ActiveInstance>> = HashMap::new();
        for instance in self.registry.all() {
            let concurrency = queues
                .get(&instance.queue_name)
                .map(|q| q.concurrency)
                .unwrap_or_default();
            out.entry(instance.queue_name.clone()).or_default().insert(
                instance.ident.clone(),
                ActiveInstance {
                    ident: instance.ident.clone(),
                    state: instance.state.get(),
                    args: instance.args.clone(),
                    config: ActiveConfig {
                        concurrency,
                        is_detached: instance.is_detached,
                        cancel_on_shutdown: instance.cancel_on_shutdown,
                    },
                },
            );
        }
        out
    }

    /// True while the runtime is synchronously executing interpreter work —
    /// inside `drive`'s call into the interpreter, inside a host-initiated
    /// `transact` scope, or (since nested pipelines drive inside their
    /// parent's own `drive` call) inside a nested pipeline's execution too.
    pub fn in_pipeline(&self) -> bool {
        self.transact_depth.get() > 0
    }

    pub fn on_cancel(&self, listener: impl Fn(&Ident) + 'static) {
        self.cancel_listeners.borrow_mut().push(Box::new(listener));
    }

    pub fn set_error_reporter(&self, reporter: impl Fn(&PipelineError) + 'static) {
        *self.error_reporter.borrow_mut() = Some(Box::new(reporter));
    }

    /// Manually report an error through the configured reporter, honoring
    /// the at-most-once guarantee. A no-op if already reported or if
    /// no reporter is configured.
    pub fn report_error(&self, error: &PipelineError) {
        if error.mark_reported() {
            if let Some(reporter) = self.error_reporter.borrow().as_ref() {
                reporter(error);
            }
        }
    }

    /// Run a batch of runtime operations under one tracing span, useful
    /// when a caller wants several `invoke`/`cancel` calls attributed to
    /// the same logical unit of work in logs.
    pub fn transact<T>(self: &Rc<Self>, f: impl FnOnce(&Rc<Self>) -> T) -> T {
        let depth = self.transact_depth.get();
        self.transact_depth.set(depth + 1);
        let _span = tracing::info_span!("transact", depth).entered();
        let result = f(self);
        self.transact_depth.set(depth);
        result
    }

    // --- invocation ---

    /// Invoke the pipeline registered under `key`. A `detached` pipeline
    /// returns `Ok(None)` — "undefined" — unconditionally: it runs
    /// independently and the caller is never linked to its completion.
    pub fn invoke(
        self: &Rc<Self>,
        key: &str,
        args: AnyValue,
    ) -> Result<Option<Invocation>, RuntimeError> {
        let pipeline = self
            .pipelines
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownPipeline(key.to_string()))?;
        let detached = pipeline.config.is_detached;
        let invocation = self.spawn_instance(pipeline, args, None, Some(key.to_string()))?;
        Ok(if detached { None } else { Some(invocation) })
    }

    pub(crate) fn invoke_nested(
        self: &Rc<Self>,
        parent: &Rc<Instance<C>>,
        pipeline: Pipeline<C>,
        args: AnyValue,
    ) -> NestedOutcome {
        let detached = pipeline.config.is_detached;
        match self.spawn_instance(pipeline, args, Some(parent.ident.clone()), None) {
            Ok(_) if detached => NestedOutcome::Detached,
            Ok(Invocation::Ready(outcome)) => NestedOutcome::Sync(outcome),
            Ok(Invocation::Pending(deferred)) => NestedOutcome::Pending(deferred),
            // A misconfigured nested pipeline (concurrency mismatch) can't
            // be surfaced through the step's return type, so it becomes an
            // ordinary pipeline error instead of a `RuntimeError`.
            Err(e) => NestedOutcome::Sync(Outcome::Error(PipelineError::message(e.to_string()))),
        }
    }

    fn spawn_instance(
        self: &Rc<Self>,
        pipeline: Pipeline<C>,
        args: AnyValue,
        parent: Option<Ident>,
        key: Option<String>,
    ) -> Result<Invocation, RuntimeError> {
        let queue_name = pipeline
            .config
            .queue_name
            .as_ref()
            .map(|q| q.resolve(&args))
            .unwrap_or_else(|| pipeline.id.as_str().to_string());

        {
            let queues = self.queues.borrow();
            if let Some(existing) = queues.get(&queue_name) {
                if existing.concurrency != pipeline.config.concurrency {
                    return Err(RuntimeError::ConcurrencyMismatch { queue: queue_name });
                }
            }
        }

        if pipeline.config.use_existing {
            if let Some(key) = &key {
                if let Some(existing) = self
                    .registry
                    .in_queue(&queue_name, key, &args)
                    .into_iter()
                    .next()
                {
                    tracing::debug!(queue = %queue_name, ident = %existing.ident, "useExisting reused in-flight instance");
                    return Ok(Invocation::Pending(existing.deferred.clone()));
                }
            }
        }

        self.queues
            .borrow_mut()
            .entry(queue_name.clone())
            .or_insert_with(|| Queue::new(queue_name.clone(), pipeline.config.concurrency));

        let ident = Ident::new(pipeline.id.clone(), self.id_gen.next_token());
        let (settle, deferred) = crate::registry::deferred_pair();
        let instance = Rc::new(Instance {
            ident: ident.clone(),
            queue_name: queue_name.clone(),
            pipeline_key: key,
            args: args.clone(),
            state: Cell::new(InstanceState::Pending),
            parent: parent.clone(),
            children: RefCell::new(IndexSet::new()),
            is_detached: pipeline.config.is_detached,
            cancel_on_shutdown: pipeline.config.cancel_on_shutdown,
            canceller: Canceller::new(),
            driving: Cell::new(false),
            settle: RefCell::new(Some(settle)),
            deferred: deferred.clone(),
            resumable: RefCell::new(None),
        });

        let resumable = Resumable::new(
            pipeline.id.clone(),
            ident.clone(),
            pipeline.config.clone(),
            args.clone(),
            Body {
                begin: pipeline.body.begin.clone(),
                rescue: pipeline.body.rescue.clone(),
                finally: pipeline.body.finally.clone(),
            },
            ExecState::new(loom_core::Block::Begin, pipeline.body.begin.clone(), args),
        );
        *instance.resumable.borrow_mut() = Some(resumable);

        if !instance.is_detached {
            if let Some(parent_ident) = &parent {
                if let Some(parent_inst) = self.registry.get(parent_ident) {
                    parent_inst.children.borrow_mut().insert(ident.clone());
                }
            }
        }

        let admission = self
            .queues
            .borrow_mut()
            .get_mut(&queue_name)
            .map(|q| q.admit(ident.clone()));

        self.registry.insert(Rc::clone(&instance));

        match admission {
            Some(Admission::Run) => {
                tracing::debug!(queue = %queue_name, ident = %ident, "admitted: run");
                Ok(self.begin_drive(ident))
            }
            Some(Admission::RestartOldest(old)) => {
                tracing::debug!(queue = %queue_name, ident = %ident, evicted = %old, "admitted: restart, evicting oldest");
                if let Some(old_inst) = self.registry.get(&old) {
                    old_inst.canceller.fire();
                }
                Ok(self.begin_drive(ident))
            }
            Some(Admission::Wait) => {
                tracing::debug!(queue = %queue_name, ident = %ident, "admitted: enqueued, waiting");
                Ok(Invocation::Pending(deferred))
            }
            Some(Admission::Drop) => {
                tracing::debug!(queue = %queue_name, ident = %ident, "refused: dropped at capacity");
                self.complete_instance(ident, Outcome::Cancelled);
                Ok(Invocation::Ready(Outcome::Cancelled))
            }
            Some(Admission::KeepLatestEvict(evicted)) => {
                tracing::debug!(queue = %queue_name, ident = %ident, evicted = evicted.len(), "admitted: keepLatest, evicting pending peers");
                for old in evicted {
                    self.complete_instance(old, Outcome::Cancelled);
                }
                Ok(Invocation::Pending(deferred))
            }
            None => {
                // No queue entry — unreachable since we just inserted one.
                Ok(Invocation::Pending(deferred))
            }
        }
    }

    fn begin_drive(self: &Rc<Self>, ident: Ident) -> Invocation {
        match self.drive(ident.clone(), Resume::Fresh) {
            Some(outcome) => Invocation::Ready(outcome),
            None => match self.registry.get(&ident) {
                Some(instance) => Invocation::Pending(instance.deferred.clone()),
                None => Invocation::Ready(Outcome::Cancelled),
            },
        }
    }

    /// Pop the stored resumable and run it. Returns `Some(outcome)` if it
    /// reached a terminal state synchronously; otherwise a continuation has
    /// been scheduled and the caller should await the instance's deferred.
    fn drive(self: &Rc<Self>, ident: Ident, resume: Resume<C>) -> Option<Outcome> {
        let instance = self.registry.get(&ident)?;
        let resumable = instance.resumable.borrow_mut().take()?;
        instance.driving.set(true);
        instance.state.set(InstanceState::Running);
        tracing::debug!(ident = %ident, "instance running");

        let depth = self.transact_depth.get();
        self.transact_depth.set(depth + 1);
        let result = interpreter::run(self, &instance, resumable, resume);
        self.transact_depth.set(depth);

        match result {
            RunResult::Terminal(outcome) => {
                tracing::debug!(ident = %ident, outcome = ?outcome, "instance settled");
                self.complete_instance(ident, outcome.clone());
                Some(outcome)
            }
            RunResult::SuspendedOnStep { resumable, fut } => {
                tracing::debug!(ident = %ident, "instance suspended on a step promise");
                *instance.resumable.borrow_mut() = Some(resumable);
                self.spawn_step_wait(ident, instance, fut);
                None
            }
            RunResult::SuspendedOnNested { resumable, deferred } => {
                tracing::debug!(ident = %ident, "instance suspended on a nested pipeline");
                *instance.resumable.borrow_mut() = Some(resumable);
                self.spawn_nested_wait(ident, deferred);
                None
            }
        }
    }

    fn spawn_step_wait(self: &Rc<Self>, ident: Ident, instance: Rc<Instance<C>>, fut: StepFuture<C>) {
        let rt = Rc::clone(self);
        tokio::task::spawn_local(async move {
            tokio::select! {
                out = fut => {
                    tracing::debug!(ident = %ident, "instance resumed from a step promise");
                    let resume = match out {
                        loom_core::PromiseOutput::Value(v) => Resume::Value(v),
                        loom_core::PromiseOutput::Error(e) => Resume::Error(e),
                        loom_core::PromiseOutput::Pipeline(p) => Resume::Nested(p),
                    };
                    rt.drive(ident, resume);
                }
                _ = instance.canceller.cancelled() => {
                    tracing::debug!(ident = %ident, "instance cancelled while suspended");
                    rt.cancel_now(ident);
                }
            }
        });
    }

    fn spawn_nested_wait(self: &Rc<Self>, ident: Ident, deferred: DeferredResult) {
        let rt = Rc::clone(self);
        tokio::task::spawn_local(async move {
            let outcome = deferred.await;
            match outcome {
                Outcome::Cancelled => {
                    rt.complete_instance(ident, Outcome::Cancelled);
                }
                other => {
                    rt.drive(ident, outcome_to_resume(other));
                }
            }
        });
    }

    /// What a suspended instance's race task does once it observes its own
    /// cancellation: cascade to any descendants it picked up since it last
    /// ran (`cancel_tree` is idempotent if a caller already did this), then
    /// unconditionally settle — nothing else is watching this instance's
    /// wait, so nothing else will.
    fn cancel_now(self: &Rc<Self>, ident: Ident) {
        self.cancel_tree(&ident);
        self.complete_instance(ident, Outcome::Cancelled);
    }

    /// Cancel `ident` and every non-detached descendant, depth-first,
    /// leaves first. Instances still
    /// `Pending` (never driven, so no task is watching their canceller)
    /// are settled synchronously here; running/suspended ones are settled
    /// once their own race task observes the cancellation (`cancel_now`).
    pub fn cancel(self: &Rc<Self>, ident: &Ident) {
        self.cancel_tree(ident);
    }

    fn cancel_tree(self: &Rc<Self>, ident: &Ident) {
        let Some(instance) = self.registry.get(ident) else {
            return;
        };
        if instance.canceller.is_fired() {
            return;
        }
        let children: Vec<Ident> = instance.children.borrow().iter().cloned().collect();
        tracing::debug!(ident = %ident, children = children.len(), "cancelling subtree");
        for child in children {
            self.cancel_tree(&child);
        }
        instance.state.set(InstanceState::Cancelled);
        let never_driven = !instance.driving.get();
        instance.canceller.fire();
        for listener in self.cancel_listeners.borrow().iter() {
            listener(ident);
        }
        if never_driven {
            tracing::debug!(ident = %ident, "never-driven instance cancelled, settling immediately");
            self.complete_instance(ident.clone(), Outcome::Cancelled);
        }
    }

    /// Cancel every live root instance eligible for shutdown cancellation,
    /// used by [`Runtime::stop`].
    pub fn cancel_all(self: &Rc<Self>) {
        let roots: Vec<Ident> = self
            .registry
            .all()
            .iter()
            .filter(|i| i.parent.is_none() && i.cancel_on_shutdown)
            .map(|i| i.ident.clone())
            .collect();
        for ident in roots {
            self.cancel_tree(&ident);
        }
    }

    /// Cancel every shutdown-eligible instance and refuse further
    /// invocations.
    pub fn stop(self: &Rc<Self>) {
        self.cancel_all();
        self.stopped.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Settle `ident` with `outcome`. If it still has live (non-detached)
    /// children, it transitions to `waiting-children` and stays in the
    /// registry — and on its queue — until the last of them drains; only a
    /// childless instance is actually retired here and now.
    fn complete_instance(self: &Rc<Self>, ident: Ident, outcome: Outcome) {
        let Some(instance) = self.registry.get(&ident) else {
            return;
        };
        if let Outcome::Error(e) = &outcome {
            self.report_error(e);
        }
        if let Some(tx) = instance.settle.borrow_mut().take() {
            let _ = tx.send(outcome.clone());
        }

        if !instance.children.borrow().is_empty() {
            tracing::debug!(ident = %ident, "instance settled, waiting on live children");
            instance.state.set(InstanceState::WaitingChildren);
            return;
        }
        self.retire(ident, instance);
    }

    /// Remove a settled, childless instance from the registry and its
    /// queue, starting the next queued member if one was waiting. If this
    /// was the parent's last live child and the parent is `waiting-children`,
    /// the parent is retired too, recursively up the chain.
    fn retire(self: &Rc<Self>, ident: Ident, instance: Rc<Instance<C>>) {
        self.registry.remove(&ident);
        if let Some(parent_ident) = &instance.parent {
            if let Some(parent) = self.registry.get(parent_ident) {
                parent.children.borrow_mut().shift_remove(&ident);
                if parent.state.get() == InstanceState::WaitingChildren
                    && parent.children.borrow().is_empty()
                {
                    tracing::debug!(ident = %parent_ident, "last live child drained, retiring parent");
                    self.retire(parent_ident.clone(), parent);
                }
            }
        }

        let next = {
            let mut queues = self.queues.borrow_mut();
            match queues.get_mut(&instance.queue_name) {
                Some(queue) => {
                    queue.complete(&ident);
                    queue.start_next()
                }
                None => None,
            }
        };
        if let Some(next_ident) = next {
            self.drive(next_ident, Resume::Fresh);
        }
    }
}

fn outcome_to_resume<C>(outcome: Outcome) -> Resume<C> {
    match outcome {
        Outcome::Value(v) => Resume::Value(Some(v)),
        Outcome::Error(e) => Resume::Error(e),
        Outcome::Cancelled => Resume::Value(None),
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
