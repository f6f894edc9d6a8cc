// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot cancellation signal for a single pipeline instance.
//!
//! Every live instance owns exactly one `Canceller`. Firing it is
//! idempotent and synchronous; observing it (`cancelled()`) is async so it
//! can be raced against whatever the instance is currently suspended on.

use std::cell::{Cell, RefCell};
use tokio::sync::oneshot;

pub struct Canceller {
    tx: RefCell<Option<oneshot::Sender<()>>>,
    rx: RefCell<oneshot::Receiver<()>>,
    fired: Cell<bool>,
}

impl Canceller {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            tx: RefCell::new(Some(tx)),
            rx: RefCell::new(rx),
            fired: Cell::new(false),
        }
    }

    /// Signal cancellation. Safe to call more than once; only the first
    /// call has any effect.
    pub fn fire(&self) {
        self.fired.set(true);
        if let Some(tx) = self.tx.borrow_mut().take() {
            let _ = tx.send(());
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.get()
    }

    /// Resolves once `fire()` has been called. Resolves immediately if it
    /// already has. Must not be awaited from two places concurrently for
    /// the same instance — the runtime never does this, since a given
    /// instance only ever has one suspension point in flight at a time.
    pub async fn cancelled(&self) {
        if self.fired.get() {
            return;
        }
        let _ = (&mut *self.rx.borrow_mut()).await;
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cancellation_tests.rs"]
mod tests;
