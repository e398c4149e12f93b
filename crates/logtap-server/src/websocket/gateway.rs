//! Connection gateway — the admission sequence for incoming
//! subscriber requests.
//!
//! Steps run strictly in order: token check, authentication, flow
//! parse, transport upgrade, registration. Authentication and flow
//! parsing both happen before the upgrade because their rejections
//! must go out as ordinary status-coded responses, which is no longer
//! possible once the connection has been upgraded.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use logtap_auth::Identity;
use logtap_core::FlowReference;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::{
    LISTENERS_APPROVED_TOTAL, LISTENERS_REJECTED_TOTAL, LISTENERS_REMOVED_TOTAL, LISTENERS_TOTAL,
};
use crate::server::AppState;

use super::registry::SubscriberRegistry;
use super::subscriber::Subscriber;

/// Request header carrying the opaque bearer token.
pub const AUTH_HEADER: &str = "authorization";

/// Admission handler for `/flow/{namespace}/{name}` and
/// `/clusterflow/{name}`.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    counter!(LISTENERS_TOTAL).increment(1);
    debug!(%path, "new listener");

    let Some(token) = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok()) else {
        counter!(LISTENERS_REJECTED_TOTAL).increment(1);
        return (StatusCode::FORBIDDEN, "missing authentication token").into_response();
    };

    let identity = match state.authenticator.authenticate(token).await {
        Ok(identity) => identity,
        Err(err) => {
            counter!(LISTENERS_REJECTED_TOTAL).increment(1);
            warn!(error = %err, "listener authentication failed");
            return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
        }
    };

    let flow = match FlowReference::parse(&path) {
        Ok(flow) => flow,
        Err(err) => {
            return (StatusCode::NOT_FOUND, err.to_string()).into_response();
        }
    };

    // The failed handshake already consumed the connection; nothing
    // structured can be sent beyond the rejection itself.
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(error = %rejection, "failed to upgrade connection");
            return rejection.into_response();
        }
    };

    let registry = Arc::clone(&state.registry);
    let capacity = state.send_queue_capacity;
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| subscriber_session(socket, registry, identity, flow, capacity))
        .into_response()
}

/// Drives one admitted subscriber connection until it closes.
async fn subscriber_session(
    socket: WebSocket,
    registry: Arc<SubscriberRegistry>,
    identity: Identity,
    flow: FlowReference,
    send_queue_capacity: usize,
) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel(send_queue_capacity);
    let id = Uuid::now_v7();

    let subscriber = Arc::new(Subscriber::new(
        id,
        flow.clone(),
        identity,
        tx,
        Arc::downgrade(&registry),
    ));
    registry.register(subscriber).await;
    counter!(LISTENERS_APPROVED_TOTAL).increment(1);
    info!(subscriber = %id, %flow, "listener admitted");

    let writer = tokio::spawn(write_loop(sink, rx, Arc::clone(&registry), flow.clone(), id));

    watch_for_close(stream).await;

    counter!(LISTENERS_REMOVED_TOTAL).increment(1);
    info!(subscriber = %id, %flow, "listener connection closing");
    registry.unregister(&flow, id).await;
    // Dropping the registry's Arc closed the send queue; the writer
    // drains and exits on its own.
    drop(writer);
}

/// Passive watch: reads inbound frames only to detect close or error,
/// taking no application action.
async fn watch_for_close(mut stream: SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Sole consumer of a subscriber's send queue; owns the write half of
/// the connection so frames never interleave.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<bytes::Bytes>,
    registry: Arc<SubscriberRegistry>,
    flow: FlowReference,
    id: Uuid,
) {
    while let Some(payload) = rx.recv().await {
        if let Err(err) = sink.send(Message::Binary(payload)).await {
            warn!(
                subscriber = %id,
                %flow,
                error = %err,
                "failed to write record to websocket connection"
            );
            registry.unregister(&flow, id).await;
            break;
        }
    }
}
