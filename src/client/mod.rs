//! Client reconciliation state machine (specification §4.6).

use crate::core::error::{ProtocolError, ReconciliationError, Result};
use crate::core::hash::ModelHasher;
use crate::core::ids::{ClientDeltaId, ClientId, DeltaId, ModelId};
use crate::delta::{interpret, Delta, DeltaIoContext};
use crate::protocol::{FullUpdate, IncrementalUpdate, ServerMessage, WireDelta};
use crate::registry::RefAdder;
use std::sync::Arc;

/// A locally-minted delta awaiting server acknowledgment.
pub struct PendingDelta<M> {
    /// The delta itself.
    pub delta: Arc<dyn Delta<M>>,
    /// The id minted for it.
    pub delta_id: DeltaId,
    /// The optimistic, locally-chosen context it was first run under.
    pub context: DeltaIoContext,
}

impl<M> Clone for PendingDelta<M> {
    fn clone(&self) -> Self {
        Self { delta: Arc::clone(&self.delta), delta_id: self.delta_id, context: self.context }
    }
}

/// The authoritative model as last confirmed by the server, paired with
/// its id.
struct ServerModel<M> {
    model: M,
    model_id: ModelId,
}

/// Client-side reconciliation state: the server's last-confirmed model,
/// the locally-optimistic `model` pending deltas have been folded into,
/// and the pending-delta queue itself.
pub struct ClientState<M> {
    client_id: ClientId,
    next_client_delta_id: u64,
    server_model: ServerModel<M>,
    pending_deltas: Vec<PendingDelta<M>>,
    model: M,
    ref_adder: Box<dyn RefAdder<M>>,
    hasher: Option<Box<dyn ModelHasher<M>>>,
}

impl<M: Clone> ClientState<M> {
    /// Initialize from the first server message, which must be `Full`.
    /// If `hasher` is supplied, the server's model id is verified against
    /// a locally computed hash.
    pub fn init(
        first_message: ServerMessage,
        ref_adder: Box<dyn RefAdder<M>>,
        hasher: Option<Box<dyn ModelHasher<M>>>,
    ) -> Result<Self>
    where
        M: serde::de::DeserializeOwned,
    {
        let full = match first_message {
            ServerMessage::Full(full) => full,
            ServerMessage::Incremental(_) => return Err(ProtocolError::FirstUpdateNotFull.into()),
        };
        Self::init_from_full(full, ref_adder, hasher)
    }

    fn init_from_full(
        full: FullUpdate,
        ref_adder: Box<dyn RefAdder<M>>,
        hasher: Option<Box<dyn ModelHasher<M>>>,
    ) -> Result<Self>
    where
        M: serde::de::DeserializeOwned,
    {
        let model: M = serde_json::from_value(full.model)?;
        if let Some(hasher) = &hasher {
            let computed = hasher.hash(&model);
            if computed != full.id {
                return Err(ReconciliationError::UpdatedModelIdMismatch {
                    expected: full.id.0,
                    actual: computed.0,
                }
                .into());
            }
        }
        Ok(Self {
            client_id: full.client_id,
            next_client_delta_id: 0,
            server_model: ServerModel { model: model.clone(), model_id: full.id },
            pending_deltas: Vec::new(),
            model,
            ref_adder,
            hasher,
        })
    }

    /// The client's assigned connection id.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// The current locally-reconciled model (server model plus every
    /// pending optimistic delta folded in).
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The number of deltas still awaiting server acknowledgment.
    pub fn pending_len(&self) -> usize {
        self.pending_deltas.len()
    }

    /// Mint a new delta id, run `delta` locally under `context`, append it
    /// to the pending queue, and fold it into the optimistic model.
    /// Returns the minted delta id (to embed in the outbound commit).
    pub fn apply(&mut self, delta: Arc<dyn Delta<M>>, context: DeltaIoContext) -> DeltaId {
        let delta_id = DeltaId::new(self.client_id, ClientDeltaId(self.next_client_delta_id));
        self.next_client_delta_id += 1;

        let result = interpret(delta.as_ref(), context, delta_id, &self.model);
        let mut new_model = result.data;
        if !result.added_refs.is_empty() {
            new_model = self.ref_adder.apply(new_model, &result.added_refs);
        }
        self.model = new_model;
        self.pending_deltas.push(PendingDelta { delta, delta_id, context });
        delta_id
    }

    /// Apply a server message: `Full` discards all pending deltas and
    /// replaces the server model outright; `Incremental` runs the
    /// two-phase linearize-then-verify algorithm.
    pub fn apply_server_message(&mut self, message: ServerMessage, codec_lookup: &dyn DeltaLookup<M>) -> Result<()>
    where
        M: serde::de::DeserializeOwned,
    {
        match message {
            ServerMessage::Full(full) => self.apply_full(full),
            ServerMessage::Incremental(inc) => self.apply_incremental(inc, codec_lookup),
        }
    }

    /// Discard pending deltas and adopt the server's snapshot outright.
    /// `next_client_delta_id` is carried forward, not reset, so any
    /// future locally-minted ids remain globally unique for this connection.
    fn apply_full(&mut self, full: FullUpdate) -> Result<()>
    where
        M: serde::de::DeserializeOwned,
    {
        let model: M = serde_json::from_value(full.model)?;
        self.pending_deltas.clear();
        self.model = model.clone();
        self.server_model = ServerModel { model, model_id: full.id };
        Ok(())
    }

    /// Two-phase incremental reconciliation (specification §4.6).
    fn apply_incremental(&mut self, update: IncrementalUpdate, lookup: &dyn DeltaLookup<M>) -> Result<()> {
        // Phase 1: linearize the update's deltas against pending_deltas.
        let mut m = self.server_model.model.clone();
        let mut d = std::mem::take(&mut self.pending_deltas);

        for wire_delta in update.deltas {
            match wire_delta {
                WireDelta::Remote { delta, id, context } => {
                    let decoded = lookup.decode(&delta)?;
                    let result = interpret(decoded.as_ref(), context, id, &m);
                    let mut next = result.data;
                    if !result.added_refs.is_empty() {
                        next = self.ref_adder.apply(next, &result.added_refs);
                    }
                    m = next;
                }
                WireDelta::Local { id, context } => {
                    let position = d.iter().position(|p| p.delta_id == id).ok_or_else(|| {
                        ReconciliationError::MissingPendingDelta(format!("{id:?}"))
                    })?;
                    let matched = d[position].clone();
                    // Drop every pending delta strictly before the match, and the match itself.
                    d.drain(0..=position);
                    let result = interpret(matched.delta.as_ref(), context, id, &m);
                    let mut next = result.data;
                    if !result.added_refs.is_empty() {
                        next = self.ref_adder.apply(next, &result.added_refs);
                    }
                    m = next;
                }
            }
        }

        // Phase 2: verify and rebuild.
        if update.base_model_id != self.server_model.model_id {
            return Err(ReconciliationError::BaseModelIdMismatch {
                expected: self.server_model.model_id.0,
                actual: update.base_model_id.0,
            }
            .into());
        }
        if let Some(hasher) = &self.hasher {
            let computed = hasher.hash(&m);
            if computed != update.updated_model_id {
                return Err(ReconciliationError::UpdatedModelIdMismatch {
                    expected: update.updated_model_id.0,
                    actual: computed.0,
                }
                .into());
            }
        }

        let mut new_model = m.clone();
        for pending in &d {
            let result = interpret(pending.delta.as_ref(), pending.context, pending.delta_id, &new_model);
            let mut next = result.data;
            if !result.added_refs.is_empty() {
                next = self.ref_adder.apply(next, &result.added_refs);
            }
            new_model = next;
        }

        self.server_model = ServerModel { model: m, model_id: update.updated_model_id };
        self.pending_deltas = d;
        self.model = new_model;
        Ok(())
    }
}

/// Decodes a `remote`/pending delta's JSON payload back into a runnable
/// `Delta<M>`. Supplied by the caller because the set of delta variants
/// participating in one protocol instance is application-specific.
pub trait DeltaLookup<M>: Send + Sync {
    /// Decode an encoded delta payload.
    fn decode(&self, json: &serde_json::Value) -> Result<Arc<dyn Delta<M>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::Effects;
    use crate::registry::NoOpRefAdder;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: i64,
    }

    struct AddN(i64);
    impl Delta<Counter> for AddN {
        fn run(&self, _effects: &mut Effects, model: &Counter) -> Counter {
            Counter { n: model.n + self.0 }
        }
    }

    struct Lookup;
    impl DeltaLookup<Counter> for Lookup {
        fn decode(&self, json: &serde_json::Value) -> Result<Arc<dyn Delta<Counter>>> {
            let n = json.get("add").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(Arc::new(AddN(n)))
        }
    }

    fn init_state(n: i64) -> ClientState<Counter> {
        let full = ServerMessage::Full(FullUpdate {
            client_id: ClientId(42),
            model: serde_json::to_value(Counter { n }).unwrap(),
            id: ModelId(1),
        });
        ClientState::init(full, Box::new(NoOpRefAdder), None).unwrap()
    }

    #[test]
    fn init_rejects_incremental_first_message() {
        let inc = ServerMessage::Incremental(IncrementalUpdate {
            base_model_id: ModelId(0),
            updated_model_id: ModelId(1),
            deltas: vec![],
        });
        let result: Result<ClientState<Counter>> =
            ClientState::init(inc, Box::new(NoOpRefAdder), None);
        assert!(result.is_err());
    }

    #[test]
    fn local_apply_is_optimistic_and_queues_pending() {
        let mut state = init_state(1);
        state.apply(Arc::new(AddN(6)), DeltaIoContext::new(500));
        assert_eq!(state.model().n, 7);
        assert_eq!(state.pending_len(), 1);
    }

    #[test]
    fn local_ack_clears_pending_and_reruns_under_server_context() {
        let mut state = init_state(1);
        let delta_id = state.apply(Arc::new(AddN(6)), DeltaIoContext::new(500));
        assert_eq!(delta_id, DeltaId::new(ClientId(42), ClientDeltaId(0)));

        let inc = ServerMessage::Incremental(IncrementalUpdate {
            base_model_id: ModelId(1),
            updated_model_id: ModelId(2),
            deltas: vec![WireDelta::Local { id: delta_id, context: DeltaIoContext::new(1000) }],
        });
        state.apply_server_message(inc, &Lookup).unwrap();
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.model().n, 7);
    }

    #[test]
    fn remote_interleaving_applies_then_reruns_pending_on_top() {
        let mut state = init_state(1);
        state.apply(Arc::new(AddN(6)), DeltaIoContext::new(500));

        let inc = ServerMessage::Incremental(IncrementalUpdate {
            base_model_id: ModelId(1),
            updated_model_id: ModelId(2),
            deltas: vec![WireDelta::Remote {
                delta: serde_json::json!({"add": 10}),
                id: DeltaId::new(ClientId(99), ClientDeltaId(5)),
                context: DeltaIoContext::new(1100),
            }],
        });
        state.apply_server_message(inc, &Lookup).unwrap();
        assert_eq!(state.pending_len(), 1);
        assert_eq!(state.model().n, 1 + 10 + 6);
    }

    #[test]
    fn dropped_local_delta_is_discarded_from_pending() {
        let mut state = init_state(1);
        let d0 = state.apply(Arc::new(AddN(1)), DeltaIoContext::new(100));
        let _d1 = state.apply(Arc::new(AddN(2)), DeltaIoContext::new(200));
        assert_eq!(state.pending_len(), 2);

        let inc = ServerMessage::Incremental(IncrementalUpdate {
            base_model_id: ModelId(1),
            updated_model_id: ModelId(2),
            deltas: vec![WireDelta::Local {
                id: DeltaId::new(d0.client_id, ClientDeltaId(1)),
                context: DeltaIoContext::new(1000),
            }],
        });
        state.apply_server_message(inc, &Lookup).unwrap();
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.model().n, 1 + 2);
    }

    #[test]
    fn base_model_id_mismatch_is_fatal() {
        let mut state = init_state(1);
        let inc = ServerMessage::Incremental(IncrementalUpdate {
            base_model_id: ModelId(999),
            updated_model_id: ModelId(2),
            deltas: vec![],
        });
        assert!(state.apply_server_message(inc, &Lookup).is_err());
    }

    #[test]
    fn missing_pending_delta_for_local_ack_is_fatal() {
        let mut state = init_state(1);
        let inc = ServerMessage::Incremental(IncrementalUpdate {
            base_model_id: ModelId(1),
            updated_model_id: ModelId(2),
            deltas: vec![WireDelta::Local {
                id: DeltaId::new(ClientId(42), ClientDeltaId(77)),
                context: DeltaIoContext::new(1000),
            }],
        });
        assert!(state.apply_server_message(inc, &Lookup).is_err());
    }
}
