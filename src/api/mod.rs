//! Demo HTTP + websocket transport binding the sync engine to a single
//! `House` document (specification §4.12). Not part of the generic engine:
//! a real deployment would swap `state`/`websocket` for its own model and
//! transport while reusing `core`, `delta`, `store`, `dispatcher`, `bridge`,
//! and `client` unchanged.

pub mod server;
pub mod state;
pub mod websocket;

pub use server::{create_app, start_server};
pub use state::AppState;
