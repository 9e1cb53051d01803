//! HTTP + websocket server for the demo transport.

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::state::AppState;
use super::websocket::ws_handler;

/// Build the router: a root info endpoint, `/health`, `/metrics`, and the
/// single `/ws` websocket route.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "delta-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Client-server state synchronization engine",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "websocket": "/ws"
        }
    }))
}

async fn health_handler(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    let status = crate::system::health::check(state.store.observer_count());
    Json(serde_json::to_value(status).expect("health status is always serializable"))
}

async fn metrics_handler() -> String {
    crate::system::metrics::collect_metrics()
}

/// Bind and serve the application, returning once the listener is closed.
pub async fn start_server(addr: SocketAddr, state: AppState) -> crate::core::error::Result<()> {
    tracing::info!(%addr, "starting delta-sync server");
    crate::system::metrics::init_registry();

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
