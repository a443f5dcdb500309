//! Module cache
//!
//! The one mutable structure shared by concurrent import requests. Each
//! entry carries the module object plus its execution state, and transitions
//! Unstarted -> Executing -> Completed exactly once per name.
//!
//! Requests for distinct names run in parallel. Requests for the same name
//! serialize: the first claimant executes with the map lock released, other
//! threads block on a condvar, and a re-entrant claim from the executing
//! thread itself (a circular import) observes the partially initialized
//! module instead of deadlocking. A failed execution removes the entry, so
//! waiters re-attempt the claim.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

enum ExecState {
    Executing(ThreadId),
    Completed,
}

struct Slot<M> {
    module: Arc<M>,
    state: ExecState,
}

/// Outcome of claiming a name for execution.
pub enum Claim<M> {
    /// The caller owns execution of this module's top-level code and must
    /// follow up with [`ModuleCache::complete`] or [`ModuleCache::fail`].
    Run(Arc<M>),
    /// The module is already available: completed, or still executing on
    /// this same thread (circular import).
    Ready(Arc<M>),
}

/// Name-keyed module cache with per-name execution serialization.
pub struct ModuleCache<M> {
    slots: Mutex<HashMap<String, Slot<M>>>,
    cond: Condvar,
}

impl<M> ModuleCache<M> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
        }
    }

    /// Claim `name` for execution, creating the module object via `make` if
    /// no entry exists yet.
    ///
    /// Blocks while another thread is executing the same name. If that
    /// execution fails and removes the entry, one blocked waiter wakes into
    /// a fresh claim and re-attempts execution itself.
    pub fn claim(&self, name: &str, make: impl FnOnce() -> M) -> Claim<M> {
        let current = thread::current().id();
        let mut slots = self.slots.lock();
        loop {
            match slots.get(name) {
                Some(slot) => match slot.state {
                    ExecState::Completed => return Claim::Ready(Arc::clone(&slot.module)),
                    ExecState::Executing(owner) if owner == current => {
                        return Claim::Ready(Arc::clone(&slot.module));
                    }
                    ExecState::Executing(_) => {
                        self.cond.wait(&mut slots);
                    }
                },
                None => {
                    let module = Arc::new(make());
                    slots.insert(
                        name.to_string(),
                        Slot {
                            module: Arc::clone(&module),
                            state: ExecState::Executing(current),
                        },
                    );
                    return Claim::Run(module);
                }
            }
        }
    }

    /// Mark a claimed name as completed and wake all waiters.
    pub fn complete(&self, name: &str) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(name) {
            slot.state = ExecState::Completed;
        }
        self.cond.notify_all();
    }

    /// Drop a claimed name after a failed execution and wake all waiters.
    ///
    /// The cache keeps no trace of the failure; a later import of the same
    /// name starts from scratch.
    pub fn fail(&self, name: &str) {
        let mut slots = self.slots.lock();
        slots.remove(name);
        self.cond.notify_all();
    }

    /// The completed module for `name`, if execution has finished.
    pub fn completed(&self, name: &str) -> Option<Arc<M>> {
        let slots = self.slots.lock();
        match slots.get(name) {
            Some(slot) if matches!(slot.state, ExecState::Completed) => {
                Some(Arc::clone(&slot.module))
            }
            _ => None,
        }
    }

    /// Whether any entry (executing or completed) exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl<M> Default for ModuleCache<M> {
    fn default() -> Self {
        Self::new()
    }
}
