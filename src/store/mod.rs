//! Server store: the authoritative, exclusively-locked model plus its
//! observer fan-out (specification §4.3).

use crate::core::ids::ModelId;
use crate::delta::{interpret, Delta, DeltaEnvelope, DeltaIoContext};
use crate::registry::RefAdder;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Strategy for computing a model's id after an update. Two strategies are
/// given because the specification leaves the computation itself
/// unspecified: a pure content hash (useful for tests, since it gives the
/// "same content, same id" property that scenario tests rely on) or a
/// monotone counter (cheaper, avoids hashing the whole model on every
/// apply, and is what a production deployment would choose).
pub trait ModelIdStrategy<M>: Send + Sync {
    /// Compute the id for `model`, given the id of the model it replaced
    /// (`None` for the very first model).
    fn next_id(&self, previous: Option<ModelId>, model: &M) -> ModelId;
}

/// Hashes the model's JSON encoding with a [`crate::core::hash::ModelHasher`].
pub struct HashModelId<H> {
    hasher: H,
}

impl<H> HashModelId<H> {
    /// Wrap a hasher as a model-id strategy.
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }
}

impl<M, H> ModelIdStrategy<M> for HashModelId<H>
where
    H: crate::core::hash::ModelHasher<M>,
{
    fn next_id(&self, _previous: Option<ModelId>, model: &M) -> ModelId {
        self.hasher.hash(model)
    }
}

/// Increments a counter on every apply, ignoring model content entirely.
#[derive(Default)]
pub struct CounterModelId {
    counter: AtomicU64,
}

impl CounterModelId {
    /// Build a counter strategy starting at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> ModelIdStrategy<M> for CounterModelId {
    fn next_id(&self, _previous: Option<ModelId>, _model: &M) -> ModelId {
        ModelId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

/// An update to observe: either the full current model (sent to a newly
/// subscribed observer) or an incremental delta (sent to everyone already
/// caught up).
#[derive(Clone)]
pub enum StoreUpdate<M: Clone> {
    /// The complete current model and its id.
    Full { model: Arc<M>, model_id: ModelId },
    /// One delta envelope applied on top of the previously-observed model.
    Incremental { base_model_id: ModelId, envelope: DeltaEnvelope<M>, model_id: ModelId },
}

/// Receives every update applied to a [`ServerStore`], in total order.
///
/// Implementors must not block: the store invokes every registered
/// observer synchronously, while holding its lock (see module docs on the
/// server's concurrency model). Slow observers should hand the update off
/// to something else (a channel, an async task) rather than doing work
/// inline.
pub trait Observer<M: Clone>: Send + Sync {
    /// Called once per applied delta, in the same order across all observers.
    fn notify(&self, update: StoreUpdate<M>);
}

type ObserverId = u64;

/// The authoritative server-side model for one synchronized document.
///
/// All mutation goes through [`ServerStore::apply_delta`], which holds an
/// exclusive lock for the duration of interpreting the delta, computing
/// the new model id, and notifying every observer — this total ordering
/// of (apply, notify) across all observers is what lets dispatchers stay
/// in lock-step with the authoritative model.
pub struct ServerStore<M: Clone> {
    inner: Mutex<StoreInner<M>>,
    observers: DashMap<ObserverId, Weak<dyn Observer<M>>>,
    next_observer_id: AtomicU64,
    model_id_strategy: Box<dyn ModelIdStrategy<M>>,
    ref_adder: Box<dyn RefAdder<M>>,
}

struct StoreInner<M> {
    model: Arc<M>,
    model_id: ModelId,
    next_client_delta_counter: u64,
}

impl<M> ServerStore<M>
where
    M: Clone + Serialize + Send + Sync + 'static,
{
    /// Build a store seeded with `initial_model`.
    pub fn new(
        initial_model: M,
        model_id_strategy: impl ModelIdStrategy<M> + 'static,
        ref_adder: impl RefAdder<M> + 'static,
    ) -> Self {
        let model_id = model_id_strategy.next_id(None, &initial_model);
        Self {
            inner: Mutex::new(StoreInner {
                model: Arc::new(initial_model),
                model_id,
                next_client_delta_counter: 0,
            }),
            observers: DashMap::new(),
            next_observer_id: AtomicU64::new(0),
            model_id_strategy: Box::new(model_id_strategy),
            ref_adder: Box::new(ref_adder),
        }
    }

    /// The current model and its id, for a newly-subscribed observer's
    /// initial full update.
    pub fn snapshot(&self) -> (Arc<M>, ModelId) {
        let inner = self.inner.lock();
        (Arc::clone(&inner.model), inner.model_id)
    }

    /// Interpret `delta` against the current model under the store's lock,
    /// update the authoritative model and its id, and notify every live
    /// observer with the resulting envelope — all before releasing the lock.
    pub fn apply_delta(
        &self,
        delta: Arc<dyn Delta<M>>,
        delta_id: crate::core::ids::DeltaId,
        context: DeltaIoContext,
        encoded: serde_json::Value,
    ) -> ModelId {
        let mut inner = self.inner.lock();
        let base_model_id = inner.model_id;
        let result = interpret(delta.as_ref(), context, delta_id, inner.model.as_ref());
        let mut new_model = result.data;
        if !result.added_refs.is_empty() {
            new_model = (*self.ref_adder).apply(new_model, &result.added_refs);
        }
        let new_model_id = self.model_id_strategy.next_id(Some(base_model_id), &new_model);

        inner.model = Arc::new(new_model);
        inner.model_id = new_model_id;
        inner.next_client_delta_counter += 1;

        let envelope = DeltaEnvelope { delta, delta_id, encoded, context };
        self.notify_all(StoreUpdate::Incremental { base_model_id, envelope, model_id: new_model_id });

        new_model_id
    }

    fn notify_all(&self, update: StoreUpdate<M>) {
        let mut dead = Vec::new();
        for entry in self.observers.iter() {
            match entry.value().upgrade() {
                Some(observer) => observer.notify(update.clone()),
                None => dead.push(*entry.key()),
            }
        }
        for id in dead {
            self.observers.remove(&id);
        }
    }

    /// Register an observer and immediately deliver the current model as
    /// a `Full` update, under the same lock that guards mutation — so the
    /// observer's first delivery is always `Full` and is never racing an
    /// in-flight `apply_delta`. Returns a handle to unsubscribe.
    pub fn observe(&self, observer: Arc<dyn Observer<M>>) -> ObserverHandle {
        let inner = self.inner.lock();
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.observers.insert(id, Arc::downgrade(&observer));
        observer.notify(StoreUpdate::Full { model: Arc::clone(&inner.model), model_id: inner.model_id });
        ObserverHandle(id)
    }

    /// Remove a previously-registered observer.
    pub fn unobserve(&self, handle: ObserverHandle) {
        self.observers.remove(&handle.0);
    }

    /// Number of currently-registered observers (live or not yet reaped).
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

/// Opaque handle returned by [`ServerStore::observe`], used to unsubscribe.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ObserverHandle(ObserverId);

impl<M: Clone> Clone for StoreUpdate<M> {
    fn clone(&self) -> Self {
        match self {
            StoreUpdate::Full { model, model_id } => {
                StoreUpdate::Full { model: Arc::clone(model), model_id: *model_id }
            }
            StoreUpdate::Incremental { base_model_id, envelope, model_id } => {
                StoreUpdate::Incremental {
                    base_model_id: *base_model_id,
                    envelope: envelope.clone(),
                    model_id: *model_id,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::Crc32ModelHasher;
    use crate::core::ids::{ClientDeltaId, ClientId, DeltaId};
    use crate::delta::Effects;
    use crate::registry::NoOpRefAdder;
    use std::sync::Mutex as StdMutex;

    struct AddOne;
    impl Delta<i64> for AddOne {
        fn run(&self, _effects: &mut Effects, model: &i64) -> i64 {
            model + 1
        }
    }

    struct RecordingObserver {
        seen: StdMutex<Vec<ModelId>>,
    }
    impl Observer<i64> for RecordingObserver {
        fn notify(&self, update: StoreUpdate<i64>) {
            let id = match update {
                StoreUpdate::Full { model_id, .. } => model_id,
                StoreUpdate::Incremental { model_id, .. } => model_id,
            };
            self.seen.lock().unwrap().push(id);
        }
    }

    #[test]
    fn apply_delta_updates_model_and_notifies_observers() {
        let store = ServerStore::new(0i64, CounterModelId::new(), NoOpRefAdder);
        let observer = Arc::new(RecordingObserver { seen: StdMutex::new(Vec::new()) });
        let handle = store.observe(Arc::clone(&observer) as Arc<dyn Observer<i64>>);

        let delta_id = DeltaId::new(ClientId(1), ClientDeltaId(0));
        store.apply_delta(Arc::new(AddOne), delta_id, DeltaIoContext::new(0), serde_json::json!({}));

        let (model, _) = store.snapshot();
        assert_eq!(*model, 1);
        assert_eq!(observer.seen.lock().unwrap().len(), 2);
        store.unobserve(handle);
    }

    #[test]
    fn hash_strategy_gives_same_id_for_same_content() {
        let hasher = Crc32ModelHasher;
        let strategy = HashModelId::new(hasher);
        let id_a = ModelIdStrategy::next_id(&strategy, None, &7i64);
        let id_b = ModelIdStrategy::next_id(&strategy, None, &7i64);
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn dropped_observer_is_reaped_on_next_notify() {
        let store = ServerStore::new(0i64, CounterModelId::new(), NoOpRefAdder);
        {
            let observer = Arc::new(RecordingObserver { seen: StdMutex::new(Vec::new()) });
            store.observe(Arc::clone(&observer) as Arc<dyn Observer<i64>>);
        }
        assert_eq!(store.observer_count(), 1);
        let delta_id = DeltaId::new(ClientId(1), ClientDeltaId(0));
        store.apply_delta(Arc::new(AddOne), delta_id, DeltaIoContext::new(0), serde_json::json!({}));
        assert_eq!(store.observer_count(), 0);
    }
}
