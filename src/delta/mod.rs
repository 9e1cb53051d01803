//! The delta language: effectful execution semantics, execution context,
//! and the envelope states a delta passes through en route to the wire.

/// Execution context.
pub mod context;
/// The delta algebra and its interpreter.
pub mod algebra;
/// Delta envelope states.
pub mod envelope;

pub use algebra::{interpret, AddedRef, Codec, Delta, DeltaRunResult, Effects};
pub use context::DeltaIoContext;
pub use envelope::{DeltaEnvelope, WithId, WithIdContext, WithIdJson};
