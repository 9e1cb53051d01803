//! Shared application state for the demo transport.

use crate::core::hash::Crc32ModelHasher;
use crate::core::ids::ClientIdAllocator;
use crate::model::House;
use crate::registry::NoOpRefAdder;
use crate::store::{HashModelId, ServerStore};
use std::sync::Arc;

/// State shared across every websocket connection: the authoritative
/// store and the connection-id allocator.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative `House` store, shared by every connected client.
    pub store: Arc<ServerStore<House>>,
    /// Allocates a fresh client id per accepted connection.
    pub client_ids: Arc<ClientIdAllocator>,
}

impl AppState {
    /// Build state seeded with `initial`. Uses the CRC32 model-id
    /// strategy (adequate for a demo/test deployment of this size; a
    /// production deployment would reach for `Blake3ModelHasher`
    /// instead — see `core::hash`) and no reference support, since the
    /// demo `House` model carries no registry field.
    pub fn new(initial: House) -> Self {
        Self {
            store: Arc::new(ServerStore::new(initial, HashModelId::new(Crc32ModelHasher), NoOpRefAdder)),
            client_ids: Arc::new(ClientIdAllocator::new()),
        }
    }
}
