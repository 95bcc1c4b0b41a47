//! WebSocket handler
//!
//! One socket runs three tasks: a reader that feeds frames to the op
//! handlers, a writer that owns the sink and records dispatches for
//! resume, and a monitor that enforces the identify and heartbeat
//! deadlines. Whichever ends first tears the connection down.

use crate::connection::{generate_session_id, Connection, ConnectionState};
use crate::handlers::MessageDispatcher;
use crate::protocol::{CloseCode, GatewayMessage, HelloPayload, OpCode};
use crate::server::GatewayState;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use huddle_cache::{GatewaySessionStore, SessionEvent};
use huddle_service::PresenceService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::Instrument;

/// Outgoing queue depth per connection
const MESSAGE_BUFFER_SIZE: usize = 256;

/// A socket must Identify or Resume within this window
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the writer gets to flush a close frame
const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub async fn gateway_handler(
    State(state): State<GatewayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| {
        let session_id = generate_session_id();
        let span = tracing::info_span!(
            "gateway_connection",
            session_id = %session_id,
            user_id = tracing::field::Empty
        );
        handle_socket(state, socket, session_id).instrument(span)
    })
}

async fn handle_socket(state: GatewayState, socket: WebSocket, session_id: String) {
    let (tx, rx) = mpsc::channel::<GatewayMessage>(MESSAGE_BUFFER_SIZE);
    let connection = state.connection_manager().add_connection(session_id.clone(), tx);

    tracing::info!("WebSocket connection established");

    let (mut ws_sink, ws_stream) = socket.split();

    let heartbeat_interval_ms = state.config().gateway.heartbeat_interval_ms;
    let hello = GatewayMessage::hello(&HelloPayload::with_interval(heartbeat_interval_ms));
    let sent = match hello.to_json() {
        Ok(json) => ws_sink.send(Message::Text(json)).await.is_ok(),
        Err(_) => false,
    };
    if !sent {
        tracing::warn!("Failed to send Hello");
        cleanup_connection(&state, &connection).await;
        return;
    }

    let (close_tx, close_rx) = oneshot::channel();
    let mut send_task = tokio::spawn(
        write_loop(
            ws_sink,
            rx,
            close_rx,
            state.session_store().clone(),
            session_id.clone(),
        )
        .in_current_span(),
    );
    let mut recv_task = tokio::spawn(
        read_loop(state.clone(), Arc::clone(&connection), ws_stream).in_current_span(),
    );
    let mut heartbeat_task = tokio::spawn(
        monitor(
            Arc::clone(&connection),
            Duration::from_millis(heartbeat_interval_ms),
        )
        .in_current_span(),
    );

    let mut writer_done = false;
    let close_code = tokio::select! {
        result = &mut recv_task => result.ok().flatten(),
        _ = &mut send_task => {
            writer_done = true;
            tracing::debug!("Send task ended");
            None
        }
        result = &mut heartbeat_task => result.ok().flatten(),
    };
    recv_task.abort();
    heartbeat_task.abort();

    if !writer_done {
        if let Some(code) = close_code {
            tracing::debug!(close_code = %code, "Closing connection");
            if close_tx.send(code).is_ok() {
                let _ = tokio::time::timeout(CLOSE_GRACE, &mut send_task).await;
            }
        }
        send_task.abort();
    }

    cleanup_connection(&state, &connection).await;
}

/// Returns the close code to send, or `None` when the client went away
async fn read_loop(
    state: GatewayState,
    connection: Arc<Connection>,
    mut ws_stream: SplitStream<WebSocket>,
) -> Option<CloseCode> {
    let mut identified = false;

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(close_code) = handle_text_message(&state, &connection, &text).await {
                    return Some(close_code);
                }
                if !identified {
                    if let Some(user_id) = connection.user_id().await {
                        tracing::Span::current().record("user_id", tracing::field::display(user_id));
                        identified = true;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!("Binary messages not supported");
                return Some(CloseCode::DecodeError);
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::info!("Client closed connection");
                return None;
            }
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket error");
                return None;
            }
        }
    }
    None
}

/// Owns the sink. Every Dispatch written is also queued for resume.
async fn write_loop(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<GatewayMessage>,
    mut close_rx: oneshot::Receiver<CloseCode>,
    store: GatewaySessionStore,
    session_id: String,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode gateway message");
                        continue;
                    }
                };
                if ws_sink.send(Message::Text(json)).await.is_err() {
                    tracing::debug!("Failed to write to WebSocket");
                    break;
                }
                if let (OpCode::Dispatch, Some(seq), Some(event_type)) = (msg.op, msg.s, msg.t) {
                    let event = SessionEvent::new(seq, event_type, msg.d.unwrap_or_default());
                    if let Err(e) = store.queue_event(&session_id, &event).await {
                        tracing::debug!(error = %e, seq, "Failed to queue event for resume");
                    }
                }
            }
            code = &mut close_rx => {
                if let Ok(code) = code {
                    let (code, reason) = GatewayMessage::close_frame(code);
                    let frame = CloseFrame { code, reason: reason.into() };
                    let _ = ws_sink.send(Message::Close(Some(frame))).await;
                }
                break;
            }
        }
    }

    let _ = ws_sink.close().await;
}

/// Enforces the identify window and the heartbeat deadline (two missed
/// intervals)
async fn monitor(connection: Arc<Connection>, heartbeat_interval: Duration) -> Option<CloseCode> {
    let deadline = heartbeat_interval * 2;
    let mut check = interval((heartbeat_interval / 2).max(Duration::from_millis(50)));

    loop {
        check.tick().await;

        if connection.is_closed() {
            return None;
        }
        if !connection.is_authenticated().await && connection.age() > IDENTIFY_TIMEOUT {
            tracing::info!("No Identify within the allowed window");
            return Some(CloseCode::IdentifyTimeout);
        }
        let since = connection.time_since_heartbeat().await;
        if since > deadline {
            tracing::warn!(since_ms = since.as_millis() as u64, "Connection timed out (no heartbeat)");
            return Some(CloseCode::SessionTimeout);
        }
    }
}

async fn handle_text_message(
    state: &GatewayState,
    connection: &Arc<Connection>,
    text: &str,
) -> Result<(), CloseCode> {
    let message = match GatewayMessage::from_json(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse message");
            return Err(CloseCode::DecodeError);
        }
    };

    tracing::trace!(op = %message.op, "Received message");

    match MessageDispatcher::dispatch(state, connection, message).await {
        Ok(Some(close_code)) => Err(close_code),
        Ok(None) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "Handler error");
            Err(e.close_code())
        }
    }
}

/// Start the resume window, update presence and drop the connection
async fn cleanup_connection(state: &GatewayState, connection: &Arc<Connection>) {
    let session_id = connection.session_id();
    tracing::info!("Cleaning up connection");

    connection.set_state(ConnectionState::Disconnected).await;

    if let Some(user_id) = connection.user_id().await {
        let store = state.session_store();
        match store.get(session_id).await {
            Ok(Some(mut session)) => {
                session.sequence = connection.current_sequence();
                session.conversations = connection.rooms().await;
                if let Err(e) = store.mark_disconnected(&mut session).await {
                    tracing::warn!(error = %e, "Failed to mark session disconnected");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load session for cleanup"),
        }

        if let Err(e) = PresenceService::new(state.service_context())
            .disconnect(user_id, session_id)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to update presence on disconnect");
        }
    }

    state.connection_manager().remove_connection(session_id).await;
}
