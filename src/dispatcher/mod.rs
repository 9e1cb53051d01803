//! Per-client dispatcher: coalesces store updates into outbound wire
//! messages, and decodes/validates inbound commits (specification §4.4).

use crate::core::error::{ProtocolError, Result};
use crate::core::ids::{ClientId, DeltaId, ModelId};
use crate::delta::{interpret, Codec, Delta, DeltaEnvelope, DeltaIoContext};
use crate::protocol::{ClientMessage, Commit, FullUpdate, IncrementalUpdate, ServerMessage, WireDelta};
use crate::registry::RefAdder;
use crate::store::{Observer, StoreUpdate};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// The outbound update a dispatcher has accumulated for its client but not
/// yet sent: coalesced per the update fold table until `msg_for_client`
/// drains it.
pub enum PendingUpdate<M> {
    /// A complete snapshot, replacing anything previously pending.
    Full { model: Arc<M>, model_id: ModelId },
    /// One or more deltas applied on top of `base_model_id`.
    Incremental { base_model_id: ModelId, envelopes: Vec<DeltaEnvelope<M>>, updated_model_id: ModelId },
}

/// Mediates between one connection and the [`crate::store::ServerStore`].
///
/// All three operations (`model_updated`, `msg_for_client`, `msg_from_client`)
/// are documented as always being called under a per-dispatcher lock; this
/// type owns that lock itself so callers cannot forget to take it.
pub struct ClientDispatcher<M> {
    client_id: ClientId,
    pending: Mutex<Option<PendingUpdate<M>>>,
    ref_adder: Box<dyn RefAdder<M>>,
}

impl<M> ClientDispatcher<M>
where
    M: Serialize + Send + Sync + 'static,
{
    /// Build a dispatcher for a freshly-assigned client id. `ref_adder` is
    /// the same reference-resolution policy the backing
    /// [`crate::store::ServerStore`] was built with — the dispatcher needs
    /// it to advance a pending `Full`'s model when further deltas arrive
    /// before that `Full` has been drained (see `model_updated`).
    pub fn new(client_id: ClientId, ref_adder: impl RefAdder<M> + 'static) -> Self {
        Self { client_id, pending: Mutex::new(None), ref_adder: Box::new(ref_adder) }
    }

    /// The client id this dispatcher was built for.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Merge an incoming store update into the pending outbound update,
    /// per the fold table: a fresh `Full` always replaces whatever was
    /// pending; an `Incremental` extends a pending `Incremental`'s delta
    /// list (or is adopted as-is if nothing was pending).
    pub fn model_updated(&self, update: StoreUpdate<M>) {
        let mut pending = self.pending.lock();
        *pending = Some(match (pending.take(), update) {
            (None, StoreUpdate::Full { model, model_id }) => PendingUpdate::Full { model, model_id },
            (None, StoreUpdate::Incremental { base_model_id, envelope, model_id }) => {
                PendingUpdate::Incremental {
                    base_model_id,
                    envelopes: vec![envelope],
                    updated_model_id: model_id,
                }
            }
            (Some(_), StoreUpdate::Full { model, model_id }) => PendingUpdate::Full { model, model_id },
            (
                Some(PendingUpdate::Full { model, .. }),
                StoreUpdate::Incremental { envelope, model_id, .. },
            ) => {
                // Full A | Incremental B -> Full A with A.model advanced by
                // B's delta, not A re-sent unchanged: a client that hasn't
                // drained its pending Full yet must still see every delta
                // that has since been applied, once it does drain.
                let result =
                    interpret(envelope.delta.as_ref(), envelope.context, envelope.delta_id, model.as_ref());
                let mut advanced = result.data;
                if !result.added_refs.is_empty() {
                    advanced = self.ref_adder.apply(advanced, &result.added_refs);
                }
                PendingUpdate::Full { model: Arc::new(advanced), model_id }
            }
            (
                Some(PendingUpdate::Incremental { base_model_id, mut envelopes, .. }),
                StoreUpdate::Incremental { envelope, model_id, .. },
            ) => {
                envelopes.push(envelope);
                PendingUpdate::Incremental { base_model_id, envelopes, updated_model_id: model_id }
            }
        });
    }

    /// Atomically take and clear the pending outbound update, encoding it
    /// to wire form if present.
    pub fn msg_for_client(&self) -> Option<ServerMessage> {
        let pending = self.pending.lock().take()?;
        Some(self.encode(pending))
    }

    fn encode(&self, pending: PendingUpdate<M>) -> ServerMessage {
        match pending {
            PendingUpdate::Full { model, model_id } => ServerMessage::Full(FullUpdate {
                client_id: self.client_id,
                model: serde_json::to_value(model.as_ref())
                    .expect("model must be serializable"),
                id: model_id,
            }),
            PendingUpdate::Incremental { base_model_id, envelopes, updated_model_id } => {
                let deltas = envelopes
                    .into_iter()
                    .map(|env| {
                        if env.delta_id.client_id == self.client_id {
                            WireDelta::Local { id: env.delta_id, context: env.context }
                        } else {
                            WireDelta::Remote { delta: env.encoded, id: env.delta_id, context: env.context }
                        }
                    })
                    .collect();
                ServerMessage::Incremental(IncrementalUpdate {
                    base_model_id,
                    updated_model_id,
                    deltas,
                })
            }
        }
    }

    /// Decode an inbound client message; if it is a commit whose client id
    /// matches this dispatcher's, decode its delta payload with `codec`
    /// and return the envelope ready for `ServerStore::apply_delta`.
    /// Any other shape (or a mismatched client id) is rejected.
    pub fn decode_commit<D>(
        &self,
        message: ClientMessage,
        codec: &dyn Codec<D>,
    ) -> Result<(Arc<D>, DeltaId, serde_json::Value)>
    where
        D: Delta<M> + 'static,
    {
        let ClientMessage::Commit(Commit { delta, id }) = message;
        if id.client_id != self.client_id {
            return Err(ProtocolError::ClientIdMismatch {
                message: id.client_id.0,
                connection: self.client_id.0,
            }
            .into());
        }
        let decoded = codec.decode(&delta).map_err(crate::core::error::DeltaError::DecodeFailed)?;
        Ok((Arc::new(decoded), id, delta))
    }
}

impl<M> Observer<M> for ClientDispatcher<M>
where
    M: Clone + Serialize + Send + Sync + 'static,
{
    fn notify(&self, update: StoreUpdate<M>) {
        self.model_updated(update);
    }
}

/// Build the context a freshly-decoded commit should run under. Grounded
/// on the specification's requirement that the server generates the
/// context at apply time, not at receipt time.
pub fn fresh_context(moment_millis: i64) -> DeltaIoContext {
    DeltaIoContext::new(moment_millis)
}
