//! Per-connection websocket glue: allocates a client id, wires a
//! dispatcher and pull bridge into the store, and pumps both directions
//! of the socket (specification §4.12).

use crate::api::state::AppState;
use crate::bridge::PullBridge;
use crate::delta::DeltaIoContext;
use crate::dispatcher::ClientDispatcher;
use crate::model::{House, HouseDelta, HouseDeltaCodec};
use crate::protocol::{parse_client_frame, render_server_frame};
use crate::store::Observer;
use crate::system::metrics::Metrics;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Axum handler: upgrade the HTTP connection and hand it to [`run_connection`].
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state))
}

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

async fn run_connection(socket: WebSocket, state: AppState) {
    let client_id = state.client_ids.allocate();
    let dispatcher =
        Arc::new(ClientDispatcher::<House>::new(client_id, crate::registry::NoOpRefAdder));
    let bridge = Arc::new(PullBridge::new(Arc::clone(&dispatcher)));

    let handle = state.store.observe(Arc::clone(&bridge) as Arc<dyn Observer<House>>);
    Metrics::global().dispatcher.active_connections.inc();
    tracing::info!(client = client_id.0, "client connected");

    let (sink, stream) = socket.split();
    let (tx, rx) = flume::unbounded::<Message>();

    let pump = tokio::spawn(pump_outbound(Arc::clone(&bridge), tx));
    let send_task = tokio::spawn(forward_to_socket(rx, sink));

    read_inbound(stream, &state, &dispatcher).await;

    pump.abort();
    send_task.abort();
    state.store.unobserve(handle);
    Metrics::global().dispatcher.active_connections.dec();
    tracing::info!(client = client_id.0, "client disconnected");
}

/// Repeatedly pulls the next outbound message from the bridge and pushes
/// its rendered frame onto `tx` for the send loop to deliver.
async fn pump_outbound(bridge: Arc<PullBridge<House>>, tx: flume::Sender<Message>) {
    loop {
        let (resolve_tx, resolve_rx) = tokio::sync::oneshot::channel();
        bridge.pull(Box::new(move |message| {
            let _ = resolve_tx.send(message);
        }));
        match resolve_rx.await {
            Ok(message) => {
                let frame = render_server_frame(&message);
                Metrics::global().dispatcher.messages_sent.inc();
                if tx.send(Message::Text(frame)).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

async fn forward_to_socket(
    rx: flume::Receiver<Message>,
    mut sink: futures_util::stream::SplitSink<WebSocket, Message>,
) {
    while let Ok(message) = rx.recv_async().await {
        if sink.send(message).await.is_err() {
            break;
        }
    }
}

async fn read_inbound(
    mut stream: futures_util::stream::SplitStream<WebSocket>,
    state: &AppState,
    dispatcher: &Arc<ClientDispatcher<House>>,
) {
    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let message = match parse_client_frame(&text) {
            Ok(Some(message)) => message,
            Ok(None) => continue, // keepalive
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed client frame");
                Metrics::global().dispatcher.commits_rejected.inc();
                continue;
            }
        };
        match dispatcher.decode_commit::<HouseDelta>(message, &HouseDeltaCodec) {
            Ok((delta, delta_id, encoded)) => {
                Metrics::global().dispatcher.commits_accepted.inc();
                let timer = crate::system::metrics::Timer::start(Metrics::global().store.apply_duration.clone());
                state.store.apply_delta(delta, delta_id, DeltaIoContext::new(now_millis()), encoded);
                timer.finish();
                Metrics::global().store.deltas_applied.inc();
            }
            Err(err) => {
                tracing::warn!(error = %err, "dropping rejected commit");
                Metrics::global().dispatcher.commits_rejected.inc();
            }
        }
    }
}
