//! The delta envelope states a delta passes through on its way from local
//! minting to storage in the server's outbound stream (specification §3,
//! "Delta envelopes").

use crate::core::ids::DeltaId;
use crate::delta::algebra::Delta;
use crate::delta::context::DeltaIoContext;
use serde_json::Value as Json;
use std::sync::Arc;

/// `{delta, deltaId}` — a delta after local minting, before serialization.
pub struct WithId<M> {
    /// The delta itself.
    pub delta: Arc<dyn Delta<M>>,
    /// The id assigned at minting time.
    pub delta_id: DeltaId,
}

/// `{delta, deltaId, encoded}` — after serialization, before a context exists.
pub struct WithIdJson<M> {
    /// The delta itself.
    pub delta: Arc<dyn Delta<M>>,
    /// The id assigned at minting time.
    pub delta_id: DeltaId,
    /// The delta's JSON encoding, as sent/received over the wire.
    pub encoded: Json,
}

impl<M> WithId<M> {
    /// Attach the delta's wire encoding, producing a [`WithIdJson`] envelope.
    pub fn with_json(self, encoded: Json) -> WithIdJson<M> {
        WithIdJson { delta: self.delta, delta_id: self.delta_id, encoded }
    }
}

/// `{delta, deltaId, context}` — on the client, after local execution.
pub struct WithIdContext<M> {
    /// The delta itself.
    pub delta: Arc<dyn Delta<M>>,
    /// The id assigned at minting time.
    pub delta_id: DeltaId,
    /// The (possibly optimistic, client-chosen) execution context it ran under.
    pub context: DeltaIoContext,
}

impl<M> WithId<M> {
    /// Attach a locally-chosen execution context, producing a [`WithIdContext`].
    pub fn with_context(self, context: DeltaIoContext) -> WithIdContext<M> {
        WithIdContext { delta: self.delta, delta_id: self.delta_id, context }
    }
}

/// `{delta, deltaId, encoded, context}` — on the server, stored in the
/// outbound update stream; also the shape clients reconcile against.
pub struct DeltaEnvelope<M> {
    /// The delta itself.
    pub delta: Arc<dyn Delta<M>>,
    /// The id assigned at minting time.
    pub delta_id: DeltaId,
    /// The delta's JSON encoding.
    pub encoded: Json,
    /// The execution context it was (or will be) applied under.
    pub context: DeltaIoContext,
}

impl<M> Clone for DeltaEnvelope<M> {
    fn clone(&self) -> Self {
        Self {
            delta: Arc::clone(&self.delta),
            delta_id: self.delta_id,
            encoded: self.encoded.clone(),
            context: self.context,
        }
    }
}

impl<M> WithIdJson<M> {
    /// Attach the server-assigned execution context, completing the envelope.
    pub fn with_context(self, context: DeltaIoContext) -> DeltaEnvelope<M> {
        DeltaEnvelope { delta: self.delta, delta_id: self.delta_id, encoded: self.encoded, context }
    }
}

impl<M> WithIdContext<M> {
    /// Attach the delta's wire encoding, completing the envelope.
    pub fn with_json(self, encoded: Json) -> DeltaEnvelope<M> {
        DeltaEnvelope { delta: self.delta, delta_id: self.delta_id, encoded, context: self.context }
    }
}
