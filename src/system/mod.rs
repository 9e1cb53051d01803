//! System-level utilities: metrics and health reporting.

pub mod metrics;

/// Health reporting, mirroring the shape a deployment's `/health` endpoint
/// would serve.
pub mod health {
    use serde::{Deserialize, Serialize};

    /// Snapshot of process health.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HealthStatus {
        /// Overall status classification.
        pub status: ServiceStatus,
        /// Number of observers currently registered with the store.
        pub active_connections: usize,
    }

    /// Coarse health classification.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum ServiceStatus {
        /// Serving traffic normally.
        Healthy,
        /// Degraded but still serving.
        Degraded,
    }

    /// Produce a health snapshot from the current observer count.
    pub fn check(active_connections: usize) -> HealthStatus {
        HealthStatus { status: ServiceStatus::Healthy, active_connections }
    }
}
