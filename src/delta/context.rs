//! Execution context (specification §3 "Execution context").

use serde::{Deserialize, Serialize};

/// Server-assigned, deterministically-replayable execution context for one
/// delta application: at minimum the wall-clock moment the server applied
/// (or the client locally applied) the delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaIoContext {
    /// Milliseconds since the Unix epoch.
    pub moment: i64,
}

impl DeltaIoContext {
    /// Build a context for the given moment.
    pub fn new(moment: i64) -> Self {
        Self { moment }
    }
}
