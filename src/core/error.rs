//! Error types and handling for the delta-sync engine.
//!
//! This module defines all error types used throughout the crate, split into
//! one umbrella `Error` and several leaf `*Error` enums per concern so that
//! call sites can match narrowly while `?` still composes across module
//! boundaries via `#[from]`.

use thiserror::Error;

/// Main result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the delta-sync engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Identifier / reference / wire codec errors.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Wire protocol errors (malformed client/server messages).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Delta decode/dispatch errors.
    #[error("delta error: {0}")]
    Delta(#[from] DeltaError),

    /// Client-side reconciliation errors (all fatal per the protocol's design).
    #[error("reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// JSON (de)serialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prometheus metrics errors.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O errors from std.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identifier string / JSON codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The string did not start with one of `guid-`, `id-`, or `ref-`.
    #[error("unrecognized identifier tag in {0:?}")]
    UnknownTag(String),

    /// The string had the wrong number of hyphen-separated hex segments.
    #[error("malformed identifier string: {0:?}")]
    MalformedIdentifier(String),

    /// A hex segment failed to parse as a 64-bit integer.
    #[error("invalid hex segment {0:?}: {1}")]
    InvalidHex(String, std::num::ParseIntError),

    /// A model/delta value failed to decode against its registered codec.
    #[error("value decode failed: {0}")]
    ValueDecode(String),
}

/// Wire protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The inbound JSON was not one of the recognized client message shapes.
    #[error("unrecognized client message: {0}")]
    UnrecognizedMessage(String),

    /// A commit's `id.clientId` did not match the connection's assigned client id.
    #[error("client id mismatch: message carried {message}, connection is {connection}")]
    ClientIdMismatch {
        /// Client id embedded in the inbound commit.
        message: u64,
        /// Client id actually assigned to this connection.
        connection: u64,
    },

    /// The first message received from the server was not a `Full` update.
    #[error("first server update was not Full")]
    FirstUpdateNotFull,
}

/// Delta-level errors.
#[derive(Error, Debug)]
pub enum DeltaError {
    /// The delta payload failed to decode with the configured codec.
    #[error("delta decode failed: {0}")]
    DecodeFailed(String),
}

/// Client reconciliation errors — all are fatal for the connection per the
/// protocol's error-handling design (§7 of the specification).
#[derive(Error, Debug)]
pub enum ReconciliationError {
    /// An incremental update's `baseModelId` did not match the client's
    /// current `serverModel.id`.
    #[error("base model id mismatch: expected {expected:?}, got {actual:?}")]
    BaseModelIdMismatch {
        /// The model id the client currently holds.
        expected: u64,
        /// The `baseModelId` carried by the incoming update.
        actual: u64,
    },

    /// The locally-recomputed model id did not match the server's
    /// `updatedModelId` after replaying an incremental update.
    #[error("updated model id mismatch: expected {expected:?}, got {actual:?}")]
    UpdatedModelIdMismatch {
        /// The model id the server claims the new state has.
        expected: u64,
        /// The model id the client computed locally.
        actual: u64,
    },

    /// A server `local` acknowledgment referenced a delta id with no
    /// matching entry in the client's pending-delta queue.
    #[error("no pending delta for acknowledged id {0:?}")]
    MissingPendingDelta(String),
}

impl Error {
    /// Construct a configuration error from anything stringifiable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
