//! Session state: the registry and its consumer gate, owned together.
//!
//! [`ImplementorSession`] is an ordinary value for embedding and testing. The
//! free functions at the bottom of this module operate on the one process-wide
//! session a viewer uses; it is created lazily on first use and replaced
//! wholesale by [`restart_session`].
//!
//! Consumers of the process-wide session run outside the session lock but
//! behind a separate delivery lock: calls never overlap, and a dispatch older
//! than one already delivered is dropped, so the last registry a consumer sees
//! is always the newest.

use crate::gate::{ConsumerGate, ConsumerHandle, Dispatch, Generation, Snapshot};
use crate::types::ModuleMapping;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

/// Registry plus gate for one viewing session.
#[derive(Debug, Default)]
pub struct ImplementorSession {
    /// Latest merged registry, shared with the gate and consumers
    registry: Snapshot,

    /// Consumer/pending handoff
    gate: ConsumerGate,

    /// Number of fragments registered so far
    fragments: usize,

    /// Generation of `registry`; carried over across restarts
    generation: Generation,
}

impl ImplementorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment's mapping and deliver the full registry.
    pub fn register(&mut self, mapping: ModuleMapping) {
        if let Some(dispatch) = self.merge_and_deliver(mapping) {
            dispatch.run();
        }
    }

    /// Attach the viewer's consumer, draining any buffered registry to it.
    pub fn attach_consumer(&mut self, handle: ConsumerHandle) {
        if let Some(dispatch) = self.gate.attach_consumer(handle) {
            dispatch.run();
        }
    }

    pub fn registry(&self) -> &Snapshot {
        &self.registry
    }

    pub fn pending(&self) -> Option<&Snapshot> {
        self.gate.pending()
    }

    pub fn has_consumer(&self) -> bool {
        self.gate.has_consumer()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    fn merge_and_deliver(&mut self, mapping: ModuleMapping) -> Option<Dispatch> {
        // A pending snapshot is replaced by this delivery anyway.
        if !self.gate.has_consumer() {
            self.gate.release_pending();
        }

        let appended = Arc::make_mut(&mut self.registry).merge(mapping);
        self.fragments += 1;
        self.generation += 1;
        tracing::debug!(
            "Registered fragment #{} ({} records, {} modules total)",
            self.fragments,
            appended,
            self.registry.module_count()
        );

        self.gate
            .deliver(self.generation, Arc::clone(&self.registry))
    }
}

thread_local! {
    /// Dispatches raised by a consumer running on this thread, waiting for it
    /// to return. `None` outside a delivery.
    static DEFERRED: RefCell<Option<VecDeque<Dispatch>>> = const { RefCell::new(None) };
}

/// Runs dispatches one at a time, newest generation wins.
#[derive(Debug)]
struct DeliveryLine {
    /// Highest generation handed to a consumer
    delivered: Mutex<Generation>,
}

impl DeliveryLine {
    const fn new() -> Self {
        Self {
            delivered: Mutex::new(0),
        }
    }

    /// Run `dispatch` unless a newer registry was already delivered.
    ///
    /// A dispatch raised from inside a consumer on the same thread is queued
    /// and run after that consumer returns.
    fn run(&self, dispatch: Dispatch) {
        let dispatch = DEFERRED.with_borrow_mut(|deferred| match deferred {
            Some(queue) => {
                queue.push_back(dispatch);
                None
            }
            None => Some(dispatch),
        });
        let Some(first) = dispatch else {
            return;
        };

        // Consumers run inside `catch_unwind`, so the guard is never poisoned
        // with a half-updated generation.
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        DEFERRED.set(Some(VecDeque::new()));

        let mut next = Some(first);
        while let Some(dispatch) = next {
            if dispatch.generation() > *delivered {
                *delivered = dispatch.generation();
                dispatch.run();
            } else {
                tracing::trace!(
                    "Dropping stale registry (generation {} <= {})",
                    dispatch.generation(),
                    *delivered
                );
            }
            next = DEFERRED.with_borrow_mut(|deferred| deferred.as_mut()?.pop_front());
        }

        DEFERRED.set(None);
    }
}

static DELIVERIES: DeliveryLine = DeliveryLine::new();

static SESSION: LazyLock<Mutex<ImplementorSession>> =
    LazyLock::new(|| Mutex::new(ImplementorSession::new()));

fn session() -> MutexGuard<'static, ImplementorSession> {
    // Every mutation completes before the guard drops, so a poisoned lock
    // still holds consistent state.
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register a fragment with the process-wide session.
///
/// The consumer, if attached, runs after the session lock is released, so it
/// may itself register fragments or inspect the session. A registration made
/// from inside the consumer is delivered once the consumer returns.
pub fn register_implementors(mapping: ModuleMapping) {
    let dispatch = session().merge_and_deliver(mapping);
    if let Some(dispatch) = dispatch {
        DELIVERIES.run(dispatch);
    }
}

/// Attach the viewer's consumer to the process-wide session.
pub fn attach_consumer(handle: ConsumerHandle) {
    let dispatch = session().gate.attach_consumer(handle);
    if let Some(dispatch) = dispatch {
        DELIVERIES.run(dispatch);
    }
}

/// Current merged registry of the process-wide session.
pub fn current_registry() -> Snapshot {
    Arc::clone(session().registry())
}

/// Run `f` against the process-wide session without mutating it.
///
/// The session lock is held while `f` runs; `f` must not call the other
/// functions in this module.
pub fn with_session<R>(f: impl FnOnce(&ImplementorSession) -> R) -> R {
    f(&session())
}

/// Discard the process-wide registry, pending snapshot and consumer.
pub fn restart_session() {
    let previous = {
        let mut current = session();
        let previous = std::mem::take(&mut *current);
        // Keep generations increasing so in-flight dispatches stay stale.
        current.generation = previous.generation;
        previous
    };
    tracing::info!(
        "Restarted implementor session ({} fragments discarded)",
        previous.fragment_count()
    );
}
