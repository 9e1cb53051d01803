//! Wire protocol: the JSON shapes exchanged between client and server
//! (specification §6).

use crate::core::ids::{ClientId, DeltaId, ModelId};
use crate::delta::DeltaIoContext;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One pending delta, as it appears in an `{"inc": {"deltas": [...]}}` array:
/// elided to just its id and context when the receiving client already has
/// the payload (it minted the delta itself), or carried in full otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireDelta {
    /// `{"local": {"id", "context"}}` — the payload is elided.
    #[serde(rename = "local")]
    Local {
        /// The delta id this client already holds the payload for.
        id: DeltaId,
        /// The context the server ran it under.
        context: DeltaIoContext,
    },
    /// `{"remote": {"delta", "id", "context"}}` — full payload included.
    #[serde(rename = "remote")]
    Remote {
        /// The delta's JSON-encoded payload.
        delta: Json,
        /// The delta id.
        id: DeltaId,
        /// The context it ran under.
        context: DeltaIoContext,
    },
}

/// `{"full": {"clientId", "model", "id"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullUpdate {
    /// The id assigned to this connection.
    pub client_id: ClientId,
    /// The complete current model.
    pub model: Json,
    /// The model's id.
    pub id: ModelId,
}

/// `{"inc": {"baseModelId", "updatedModelId", "deltas"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalUpdate {
    /// The model id this update applies on top of.
    pub base_model_id: ModelId,
    /// The model id that results from applying every delta in this update.
    pub updated_model_id: ModelId,
    /// The deltas to apply, in order.
    pub deltas: Vec<WireDelta>,
}

/// Outbound server → client message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// A complete snapshot.
    #[serde(rename = "full")]
    Full(FullUpdate),
    /// An incremental update.
    #[serde(rename = "inc")]
    Incremental(IncrementalUpdate),
}

/// `{"commit": {"delta", "id"}}` — the sole client → server message shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// The delta's JSON-encoded payload.
    pub delta: Json,
    /// The delta id the client minted for it.
    pub id: DeltaId,
}

/// Inbound client → server message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// A proposed delta.
    #[serde(rename = "commit")]
    Commit(Commit),
}

/// Parse an inbound frame. An empty JSON object is a keepalive, represented
/// as `Ok(None)`; anything else is parsed as a [`ClientMessage`] or an error.
pub fn parse_client_frame(raw: &str) -> crate::core::error::Result<Option<ClientMessage>> {
    let value: Json = serde_json::from_str(raw)?;
    if let Json::Object(map) = &value {
        if map.is_empty() {
            return Ok(None);
        }
    }
    let message: ClientMessage = serde_json::from_value(value)
        .map_err(|e| crate::core::error::ProtocolError::UnrecognizedMessage(e.to_string()))?;
    Ok(Some(message))
}

/// Render an outbound server message as its wire JSON string.
pub fn render_server_frame(message: &ServerMessage) -> String {
    serde_json::to_string(message).expect("server message must be serializable")
}
