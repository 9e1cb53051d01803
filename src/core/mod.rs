//! Core foundational types: errors, configuration, identifiers, and hashing.

/// Error types and result handling.
pub mod error;
/// Configuration management.
pub mod config;
/// Identifier, reference, and delta-id model.
pub mod ids;
/// Model-id hashing strategies.
pub mod hash;

pub use error::{Error, Result};
pub use config::Config;
pub use ids::{ClientId, ClientDeltaId, ClientIdAllocator, DeltaId, Guid, Id, ModelId, Ref, WithinDeltaId};
pub use hash::{Blake3ModelHasher, Crc32ModelHasher, ModelHasher};
