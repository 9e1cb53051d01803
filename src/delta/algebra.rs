//! The delta algebra and its interpreter (specification §4.1).
//!
//! A delta is not a pure function `Model -> Model`; it is a small effectful
//! program over `{GetId, GetContext, Put}`. Concrete deltas are ordinary
//! serializable values that implement [`Delta`]; `run` is handed an
//! [`Effects`] handle through which it performs the three primitive
//! operations. This mirrors the design notes' "closure given an effects
//! interface" representation, which the specification calls out as
//! semantically equivalent to a free-form algebra tree.

use crate::core::ids::{DeltaId, Guid, WithinDeltaId};
use crate::delta::context::DeltaIoContext;
use serde_json::Value as Json;

/// Describes how to encode a value registered via [`Effects::put`] into the
/// id registry's storage representation. The registry itself only ever
/// holds the encoded JSON form (its internal storage is treated
/// abstractly, per specification §1), so a codec only needs an `encode`
/// direction to participate in delta interpretation; decoding back to `T`
/// happens later, against the registry, via the same codec.
pub trait Codec<T>: Send + Sync {
    /// Encode a value for storage in the id registry.
    fn encode(&self, value: &T) -> Json;

    /// Decode a value previously produced by [`Codec::encode`].
    fn decode(&self, json: &Json) -> Result<T, String>;
}

/// A registration produced by one `Put` during delta interpretation:
/// the minted id, the revision it was registered at, and its encoded value.
#[derive(Debug, Clone)]
pub struct AddedRef {
    /// The guid minted for the new value's identity.
    pub id: Guid,
    /// The guid minted for the new value's revision.
    pub revision: Guid,
    /// The value, encoded via the codec supplied to `Put`.
    pub json: Json,
}

/// Interpreter state threaded through one delta's execution: the server- (or
/// client-) provided context, the delta id being executed, the within-delta
/// counter, and the list of refs added so far.
pub struct Effects {
    delta_id: DeltaId,
    context: DeltaIoContext,
    counter: u64,
    added_refs: Vec<AddedRef>,
}

impl Effects {
    fn new(delta_id: DeltaId, context: DeltaIoContext) -> Self {
        Self { delta_id, context, counter: 0, added_refs: Vec::new() }
    }

    fn mint(&mut self) -> Guid {
        let guid = Guid::new(self.delta_id, WithinDeltaId(self.counter));
        self.counter += 1;
        guid
    }

    /// `GetId` — mint a new guid within the current delta.
    pub fn get_id(&mut self) -> Guid {
        self.mint()
    }

    /// `GetContext` — read the execution context pinned to this delta.
    pub fn get_context(&self) -> DeltaIoContext {
        self.context
    }

    /// `Put(build, codec)` — mint an id and a revision guid, run
    /// `build(effects, id)` to produce the value, register it (encoded via
    /// `codec`) as an added ref, and return the value. `build` is handed
    /// the same `&mut Effects` it was called through, so nested `GetId`/
    /// `Put` calls inside `build` observe and advance the running
    /// within-delta counter rather than starting a fresh one.
    pub fn put<T>(
        &mut self,
        build: impl FnOnce(&mut Effects, crate::core::ids::Id<T>) -> T,
        codec: &dyn Codec<T>,
    ) -> T {
        let id_guid = self.mint();
        let revision_guid = self.mint();
        let id = crate::core::ids::Id::new(id_guid);
        let value = build(self, id);
        let json = codec.encode(&value);
        self.added_refs.insert(0, AddedRef { id: id_guid, revision: revision_guid, json });
        value
    }
}

/// A serializable, effectful transformation of a model of type `M`.
///
/// Implementors are ordinary data (typically an enum of commands) that
/// derive `Serialize`/`Deserialize` so they satisfy the "a delta value
/// itself carries enough structure to be serialized" requirement; `run`
/// is the interpreter hook that performs whatever `GetId`/`GetContext`/
/// `Put` effects the transformation needs.
pub trait Delta<M>: Send + Sync {
    /// Interpret this delta against `model`, using `effects` for any
    /// id-minting, context-reading, or registration side effects, and
    /// return the new model.
    fn run(&self, effects: &mut Effects, model: &M) -> M;
}

/// The result of running a delta: the new model and every ref it added,
/// in the order specified by §4.1 (most-recently-registered first).
pub struct DeltaRunResult<M> {
    /// The model produced by interpreting the delta.
    pub data: M,
    /// Refs added during interpretation, most recent first.
    pub added_refs: Vec<AddedRef>,
}

/// Interpret `delta` against `model` with the given `context` and `delta_id`.
///
/// Two interpreters running the same delta against the same initial model
/// with identical `(context, delta_id)` produce bit-equal results,
/// including the order and contents of `added_refs` (the determinism
/// contract of §4.1).
pub fn interpret<M, D: Delta<M> + ?Sized>(
    delta: &D,
    context: DeltaIoContext,
    delta_id: DeltaId,
    model: &M,
) -> DeltaRunResult<M> {
    let mut effects = Effects::new(delta_id, context);
    let data = delta.run(&mut effects, model);
    DeltaRunResult { data, added_refs: effects.added_refs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{ClientDeltaId, ClientId};

    struct StringCodec;
    impl Codec<String> for StringCodec {
        fn encode(&self, value: &String) -> Json {
            Json::String(value.clone())
        }
        fn decode(&self, json: &Json) -> Result<String, String> {
            json.as_str().map(|s| s.to_string()).ok_or_else(|| "not a string".to_string())
        }
    }

    struct NoopDelta;
    impl Delta<i64> for NoopDelta {
        fn run(&self, _effects: &mut Effects, model: &i64) -> i64 {
            *model
        }
    }

    struct PutTwiceDelta;
    impl Delta<i64> for PutTwiceDelta {
        fn run(&self, effects: &mut Effects, model: &i64) -> i64 {
            let _a = effects.put(|_effects, _id| "first".to_string(), &StringCodec);
            let _b = effects.put(|_effects, _id| "second".to_string(), &StringCodec);
            *model
        }
    }

    fn sample_delta_id() -> DeltaId {
        DeltaId::new(ClientId(1), ClientDeltaId(0))
    }

    #[test]
    fn running_twice_is_bit_identical() {
        let ctx = DeltaIoContext::new(1000);
        let id = sample_delta_id();
        let r1 = interpret(&PutTwiceDelta, ctx, id, &0i64);
        let r2 = interpret(&PutTwiceDelta, ctx, id, &0i64);
        assert_eq!(r1.data, r2.data);
        assert_eq!(r1.added_refs.len(), r2.added_refs.len());
        for (a, b) in r1.added_refs.iter().zip(r2.added_refs.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.revision, b.revision);
            assert_eq!(a.json, b.json);
        }
    }

    #[test]
    fn put_prepends_added_refs_in_reverse_call_order() {
        let ctx = DeltaIoContext::new(1000);
        let id = sample_delta_id();
        let result = interpret(&PutTwiceDelta, ctx, id, &0i64);
        assert_eq!(result.added_refs.len(), 2);
        assert_eq!(result.added_refs[0].json, Json::String("second".to_string()));
        assert_eq!(result.added_refs[1].json, Json::String("first".to_string()));
    }

    #[test]
    fn get_id_and_put_consume_distinct_within_delta_slots() {
        let mut effects = Effects::new(sample_delta_id(), DeltaIoContext::new(0));
        let a = effects.get_id();
        let b = effects.get_id();
        assert_ne!(a.within_delta_id, b.within_delta_id);
        let _v = effects.put(|_effects, _id| "x".to_string(), &StringCodec);
        let c = effects.get_id();
        assert_eq!(c.within_delta_id, crate::core::ids::WithinDeltaId(4));
    }

    #[test]
    fn nested_put_observes_the_parent_counter() {
        // build() issues its own GetId/Put before returning; those must
        // consume slots 2.. (0 and 1 are already spoken for by the outer
        // put's own id/revision guids), not restart the counter at 0.
        let ctx = DeltaIoContext::new(0);
        let id = sample_delta_id();
        let mut effects = Effects::new(id, ctx);
        let _outer = effects.put(
            |inner_effects, _id| {
                let nested_id = inner_effects.get_id();
                let _inner = inner_effects.put(|_effects, _id| "nested".to_string(), &StringCodec);
                format!("outer-{}", nested_id.within_delta_id.0)
            },
            &StringCodec,
        );
        // slots: 0 = outer id, 1 = outer revision, 2 = nested_id,
        // 3 = inner put's id, 4 = inner put's revision.
        assert_eq!(effects.added_refs.len(), 2);
        assert_eq!(effects.added_refs[0].json, Json::String("nested".to_string()));
        assert_eq!(effects.added_refs[1].json, Json::String("outer-2".to_string()));
        let next = effects.get_id();
        assert_eq!(next.within_delta_id, crate::core::ids::WithinDeltaId(5));
    }

    #[test]
    fn noop_delta_leaves_model_and_refs_untouched() {
        let result = interpret(&NoopDelta, DeltaIoContext::new(0), sample_delta_id(), &42i64);
        assert_eq!(result.data, 42);
        assert!(result.added_refs.is_empty());
    }
}
