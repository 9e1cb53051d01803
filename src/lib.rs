//! delta-sync: a client-server state synchronization engine for an
//! immutable domain model, built around an effectful delta algebra,
//! server-side observer fan-out, and client-side optimistic reconciliation.
#![warn(missing_docs)]

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

// Core foundational modules
pub mod core;

// The delta algebra, id registry, and authoritative server store
pub mod delta;
pub mod registry;
pub mod store;

// Per-connection plumbing between the store and a transport
pub mod bridge;
pub mod dispatcher;
pub mod protocol;

// Client-side optimistic state
pub mod client;

// Collaborative-editing primitives
pub mod logoot;
pub mod ot;

// Ambient stack
pub mod system;

// Demo transport and domain model
pub mod api;
pub mod model;

pub use core::error::{Error, Result};

/// Crate version, as set in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name, as set in `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing and the metrics registry. Call once, early in `main`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("initializing {} v{}", NAME, VERSION);
    system::metrics::init_registry();

    Ok(())
}
