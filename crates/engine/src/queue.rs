// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single named queue: the FIFO admission and completion bookkeeping one
//! concurrency behavior operates over. A queue's concurrency config freezes
//! at the moment its first member is admitted.

use indexmap::IndexMap;
use loom_core::{Concurrency, ConcurrencyBehavior, Ident};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberState {
    Pending,
    Running,
}

/// What admitting a new ident into the queue requires the caller to do.
#[derive(Debug)]
pub enum Admission {
    /// Run it now.
    Run,
    /// Enqueued; it will run once an earlier member completes.
    Wait,
    /// Refused outright; the caller never runs and sees the cancelled
    /// sentinel.
    Drop,
    /// Run it now, after cancelling this running peer to make room.
    RestartOldest(Ident),
    /// It becomes the queue's sole pending member; these previously-pending
    /// peers are cancelled and never run.
    KeepLatestEvict(Vec<Ident>),
}

pub struct Queue {
    pub name: String,
    pub concurrency: Concurrency,
    members: IndexMap<Ident, MemberState>,
}

impl Queue {
    pub fn new(name: String, concurrency: Concurrency) -> Self {
        Self {
            name,
            concurrency,
            members: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn running_count(&self) -> usize {
        self.members
            .values()
            .filter(|s| matches!(s, MemberState::Running))
            .count()
    }

    /// Decide what happens to a freshly-invoked instance given this queue's
    /// current membership and frozen concurrency behavior.
    pub fn admit(&mut self, ident: Ident) -> Admission {
        let running = self.running_count();
        if self.concurrency.max.allows(running) {
            self.members.insert(ident, MemberState::Running);
            return Admission::Run;
        }

        match self.concurrency.behavior {
            ConcurrencyBehavior::None => {
                // Unreachable in practice: `None` only pairs with an
                // unbounded max, which `allows` always accepts.
                self.members.insert(ident, MemberState::Running);
                Admission::Run
            }
            ConcurrencyBehavior::Enqueued => {
                self.members.insert(ident, MemberState::Pending);
                Admission::Wait
            }
            ConcurrencyBehavior::Dropping => Admission::Drop,
            ConcurrencyBehavior::Restartable => {
                let oldest_running = self
                    .members
                    .iter()
                    .find(|(_, s)| matches!(s, MemberState::Running))
                    .map(|(id, _)| id.clone());
                match oldest_running {
                    Some(old) => {
                        self.members.shift_remove(&old);
                        self.members.insert(ident, MemberState::Running);
                        Admission::RestartOldest(old)
                    }
                    None => {
                        self.members.insert(ident, MemberState::Running);
                        Admission::Run
                    }
                }
            }
            ConcurrencyBehavior::KeepLatest => {
                // Only ever one pending slot is retained, regardless of
                // `max` — each new admission evicts whatever was pending.
                let evicted: Vec<Ident> = self
                    .members
                    .iter()
                    .filter(|(_, s)| matches!(s, MemberState::Pending))
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in &evicted {
                    self.members.shift_remove(id);
                }
                self.members.insert(ident, MemberState::Pending);
                Admission::KeepLatestEvict(evicted)
            }
        }
    }

    /// Remove a member that has reached a terminal state.
    pub fn complete(&mut self, ident: &Ident) {
        self.members.shift_remove(ident);
    }

    /// Promote the oldest pending member to running, if the concurrency
    /// ceiling has room for it.
    pub fn start_next(&mut self) -> Option<Ident> {
        if !self.concurrency.max.allows(self.running_count()) {
            return None;
        }
        let next = self
            .members
            .iter()
            .find(|(_, s)| matches!(s, MemberState::Pending))
            .map(|(id, _)| id.clone());
        if let Some(id) = &next {
            self.members.insert(id.clone(), MemberState::Running);
        }
        next
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
