//! Single-slot handoff between merged registry data and a late-arriving consumer.
//!
//! The gate holds at most one consumer and at most one pending snapshot. It
//! never calls the consumer itself: both operations return a [`Dispatch`],
//! stamped with the merge generation of its snapshot, that the owner runs once
//! it is safe to do so (for the process-wide session, after its lock has been
//! released and in generation order).

use crate::registry::GlobalRegistry;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// An immutable, shareable view of the registry at one point in time.
pub type Snapshot = Arc<GlobalRegistry>;

/// Merge counter identifying a snapshot; later merges carry larger values.
pub type Generation = u64;

/// The function a viewer registers to receive merged implementor data.
#[derive(Clone)]
pub struct ConsumerHandle(Arc<dyn Fn(Snapshot) + Send + Sync>);

impl ConsumerHandle {
    pub fn new<F>(consumer: F) -> Self
    where
        F: Fn(Snapshot) + Send + Sync + 'static,
    {
        Self(Arc::new(consumer))
    }

    /// Invoke the consumer directly.
    pub fn call(&self, registry: Snapshot) {
        (self.0)(registry);
    }

    /// True when both handles refer to the same consumer function.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("refs", &Arc::strong_count(&self.0))
            .finish()
    }
}

/// A delivery decided by the gate but not yet performed.
#[must_use = "a dispatch does nothing until it is run"]
#[derive(Debug)]
pub struct Dispatch {
    consumer: ConsumerHandle,
    generation: Generation,
    registry: Snapshot,
}

impl Dispatch {
    pub fn registry(&self) -> &Snapshot {
        &self.registry
    }

    /// Generation of the merge that produced the snapshot.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Invoke the consumer with the snapshot.
    ///
    /// A panicking consumer is logged and swallowed so that it cannot break
    /// the registration that triggered the delivery.
    pub fn run(self) {
        let Self {
            consumer, registry, ..
        } = self;
        let modules = registry.module_count();
        let outcome = catch_unwind(AssertUnwindSafe(|| consumer.call(registry)));
        match outcome {
            Ok(()) => tracing::trace!("Delivered registry with {} modules", modules),
            Err(_) => tracing::error!("Implementor consumer panicked during delivery"),
        }
    }
}

/// Consumer/pending state for one session.
#[derive(Debug, Default)]
pub struct ConsumerGate {
    consumer: Option<ConsumerHandle>,
    pending: Option<(Generation, Snapshot)>,
}

impl ConsumerGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a freshly merged registry to the consumer, or buffer it.
    ///
    /// With a consumer attached the returned dispatch carries the full
    /// registry and `pending` is left alone. Without one, the snapshot
    /// replaces whatever was pending and nothing is returned.
    pub fn deliver(&mut self, generation: Generation, registry: Snapshot) -> Option<Dispatch> {
        match &self.consumer {
            Some(consumer) => Some(Dispatch {
                consumer: consumer.clone(),
                generation,
                registry,
            }),
            None => {
                if self.pending.replace((generation, registry)).is_some() {
                    tracing::trace!("Superseded pending registry snapshot");
                } else {
                    tracing::trace!("No consumer attached, buffering registry snapshot");
                }
                None
            }
        }
    }

    /// Make `handle` the active consumer and drain any pending snapshot to it.
    ///
    /// Replacing an existing consumer does not re-deliver anything on its own.
    pub fn attach_consumer(&mut self, handle: ConsumerHandle) -> Option<Dispatch> {
        if self.consumer.replace(handle.clone()).is_some() {
            tracing::debug!("Replacing previously attached implementor consumer");
        }

        let (generation, registry) = self.pending.take()?;
        tracing::debug!(
            "Draining pending registry ({} modules) to new consumer",
            registry.module_count()
        );
        Some(Dispatch {
            consumer: handle,
            generation,
            registry,
        })
    }

    pub fn consumer(&self) -> Option<&ConsumerHandle> {
        self.consumer.as_ref()
    }

    pub fn has_consumer(&self) -> bool {
        self.consumer.is_some()
    }

    pub fn pending(&self) -> Option<&Snapshot> {
        self.pending.as_ref().map(|(_, registry)| registry)
    }

    /// Drop a pending snapshot that is about to be superseded.
    ///
    /// Only valid immediately before a `deliver` with a newer snapshot; it
    /// releases the old `Arc` so the registry can be extended in place.
    pub(crate) fn release_pending(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImplementorRecord, ModuleMapping, ModuleName};
    use assert2::check;
    use std::sync::Mutex;

    fn snapshot(implementor: &str) -> Snapshot {
        let mut registry = GlobalRegistry::new();
        registry.merge(ModuleMapping::new().with_module(
            ModuleName::new("m1").unwrap(),
            [ImplementorRecord::new("Eq", implementor)],
        ));
        Arc::new(registry)
    }

    fn recording_consumer() -> (ConsumerHandle, Arc<Mutex<Vec<Snapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = ConsumerHandle::new(move |registry| sink.lock().unwrap().push(registry));
        (handle, seen)
    }

    #[test]
    fn test_deliver_without_consumer_buffers_latest() {
        let mut gate = ConsumerGate::new();
        check!(gate.deliver(1, snapshot("A")).is_none());
        check!(gate.deliver(2, snapshot("B")).is_none());

        let pending = gate.pending().unwrap();
        check!(pending.get("m1").unwrap()[0].implementor_id() == "B");
    }

    #[test]
    fn test_attach_drains_exactly_once() {
        let mut gate = ConsumerGate::new();
        let _ = gate.deliver(7, snapshot("A"));

        let (handle, seen) = recording_consumer();
        let dispatch = gate.attach_consumer(handle).unwrap();
        check!(dispatch.generation() == 7);
        dispatch.run();

        check!(gate.pending().is_none());
        check!(seen.lock().unwrap().len() == 1);

        let (second, second_seen) = recording_consumer();
        check!(gate.attach_consumer(second).is_none());
        check!(second_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_deliver_with_consumer_skips_pending() {
        let mut gate = ConsumerGate::new();
        let (handle, seen) = recording_consumer();
        check!(gate.attach_consumer(handle).is_none());

        gate.deliver(1, snapshot("A")).unwrap().run();
        check!(gate.pending().is_none());
        check!(seen.lock().unwrap().len() == 1);
    }

    #[test]
    fn test_reattach_replaces_consumer() {
        let mut gate = ConsumerGate::new();
        let (first, first_seen) = recording_consumer();
        let (second, second_seen) = recording_consumer();
        let _ = gate.attach_consumer(first);
        let _ = gate.attach_consumer(second.clone());

        check!(gate.consumer().unwrap().same_as(&second));
        gate.deliver(1, snapshot("A")).unwrap().run();
        check!(first_seen.lock().unwrap().is_empty());
        check!(second_seen.lock().unwrap().len() == 1);
    }

    #[test]
    fn test_panicking_consumer_is_contained() {
        let mut gate = ConsumerGate::new();
        let _ = gate.attach_consumer(ConsumerHandle::new(|_| panic!("viewer crashed")));

        gate.deliver(1, snapshot("A")).unwrap().run();
        check!(gate.has_consumer());
    }
}
