//! Duplicate-definition guard.
//!
//! Records which `(loading context, class)` pairs have been defined by this
//! engine. A pair is claimed before injection and recorded only after the
//! host accepted the class, so concurrent requests for the same pair resolve
//! to exactly one injection:
//!
//! ```text
//! thread A: exists_or_claim -> Acquired ... define ... commit
//! thread B: exists_or_claim -> (waits while A holds the claim) -> Exists -> load
//! ```
//!
//! Records are never removed; classes defined by an agent cannot be unloaded
//! either.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::context::ContextId;

type Key = (ContextId, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    InFlight(ThreadId),
    Defined,
}

#[derive(Debug, Default)]
pub struct DefinitionGuard {
    slots: Mutex<HashMap<Key, Slot>>,
    settled: Condvar,
}

/// Outcome of [`DefinitionGuard::exists_or_claim`].
#[derive(Debug)]
pub enum Claim<'g> {
    /// Already defined (or being defined further up this thread's stack):
    /// load the live class instead of injecting.
    Exists,
    /// The caller must inject, then [`commit`](DefinitionTicket::commit).
    Acquired(DefinitionTicket<'g>),
}

/// The right to inject one pair. Dropping it uncommitted releases the claim
/// without recording anything.
#[derive(Debug)]
#[must_use = "an uncommitted ticket releases its claim when dropped"]
pub struct DefinitionTicket<'g> {
    guard: &'g DefinitionGuard,
    key: Option<Key>,
}

impl DefinitionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide guard.
    pub fn global() -> Arc<DefinitionGuard> {
        static GLOBAL: OnceLock<Arc<DefinitionGuard>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(DefinitionGuard::new())))
    }

    /// Atomically checks whether `(context, name)` is defined and, if not,
    /// claims it for the caller.
    ///
    /// Blocks while another thread holds the claim. A claim held by the
    /// calling thread itself reports [`Claim::Exists`], since waiting on it
    /// could never finish.
    pub fn exists_or_claim(&self, context: ContextId, name: &str) -> Claim<'_> {
        let key: Key = (context, name.to_string());
        let me = thread::current().id();
        let mut slots = self.slots.lock();
        loop {
            match slots.get(&key).copied() {
                Some(Slot::Defined) => return Claim::Exists,
                Some(Slot::InFlight(owner)) if owner == me => {
                    debug!(class = name, context = %context, "re-entrant definition request");
                    return Claim::Exists;
                }
                Some(Slot::InFlight(_)) => self.settled.wait(&mut slots),
                None => {
                    slots.insert(key.clone(), Slot::InFlight(me));
                    return Claim::Acquired(DefinitionTicket { guard: self, key: Some(key) });
                }
            }
        }
    }

    /// Claims and records `(context, name)` in one step, returning `true` if
    /// it was already defined. For classes that reached the context by other
    /// means than this engine.
    pub fn exists_or_record(&self, context: ContextId, name: &str) -> bool {
        match self.exists_or_claim(context, name) {
            Claim::Exists => true,
            Claim::Acquired(ticket) => {
                ticket.commit();
                false
            }
        }
    }

    /// Whether `(context, name)` has been recorded as defined.
    pub fn contains(&self, context: ContextId, name: &str) -> bool {
        let key: Key = (context, name.to_string());
        matches!(self.slots.lock().get(&key), Some(Slot::Defined))
    }

    /// Number of recorded definitions.
    pub fn len(&self) -> usize {
        self.slots.lock().values().filter(|s| **s == Slot::Defined).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn settle(&self, key: Key, defined: bool) {
        let mut slots = self.slots.lock();
        if defined {
            slots.insert(key, Slot::Defined);
        } else {
            slots.remove(&key);
        }
        drop(slots);
        self.settled.notify_all();
    }
}

impl DefinitionTicket<'_> {
    /// Records the pair as defined and wakes every waiter.
    pub fn commit(mut self) {
        if let Some(key) = self.key.take() {
            self.guard.settle(key, true);
        }
    }
}

impl Drop for DefinitionTicket<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.guard.settle(key, false);
        }
    }
}
