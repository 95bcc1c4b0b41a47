//! The task that owns the socket

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::shared::{Command, ConnectionStatus, Shared};
use crate::error::{ClientError, ClientResult};
use crate::protocol::{op, Frame, ServerEvent, FATAL_CLOSE_CODES};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time the writer gets to flush a close frame
const WRITER_GRACE: Duration = Duration::from_secs(1);

enum SessionEnd {
    /// The owner shut the connection down
    Shutdown,
    /// The socket went away; reconnect
    Dropped,
}

pub(super) async fn supervise(shared: Arc<Shared>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let policy = shared.config.reconnect;
    let mut failures = 0u32;

    loop {
        let mut established = false;
        let outcome = run_session(&shared, &mut commands, &mut established).await;

        let requeued = shared.outbox.lock().requeue_in_flight();
        if requeued > 0 {
            debug!(requeued, "Unacknowledged sends queued for the next connection");
        }
        if established {
            failures = 0;
        }

        match outcome {
            Ok(SessionEnd::Shutdown) => {
                info!("Gateway connection closed");
                shared.set_status(ConnectionStatus::Closed);
                return;
            }
            Ok(SessionEnd::Dropped) => info!("Gateway connection dropped"),
            Err(ClientError::Closed { code, reason }) => {
                warn!(code, %reason, "Gateway refused the session");
                shared.set_status(ConnectionStatus::Rejected {
                    code,
                    reason: reason.clone(),
                });
                shared.outbox.lock().fail_pending(|| ClientError::Closed {
                    code,
                    reason: reason.clone(),
                });
                return;
            }
            Err(e) => warn!(error = %e, "Gateway connection failed"),
        }

        failures += 1;
        let Some(delay) = policy.delay(failures) else {
            let attempts = failures - 1;
            warn!(attempts, "Giving up on the gateway");
            shared.set_status(ConnectionStatus::Failed { attempts });
            shared
                .outbox
                .lock()
                .fail_pending(|| ClientError::ReconnectFailed { attempts });
            return;
        };

        shared.set_status(ConnectionStatus::Reconnecting { attempt: failures });
        debug!(attempt = failures, delay_ms = delay.as_millis() as u64, "Reconnecting");
        tokio::select! {
            () = time::sleep(delay) => {}
            () = wait_for_shutdown(&mut commands) => {
                shared.set_status(ConnectionStatus::Closed);
                return;
            }
        }
    }
}

/// Drain commands while offline until a shutdown arrives
async fn wait_for_shutdown(commands: &mut mpsc::UnboundedReceiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Shutdown) | None => return,
            Some(Command::Send(frame)) => {
                debug!(event = ?frame.t, "Dropping frame while disconnected");
            }
            Some(Command::Flush) => {}
        }
    }
}

async fn run_session(
    shared: &Shared,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    established: &mut bool,
) -> ClientResult<SessionEnd> {
    let limit = shared.config.handshake_timeout;
    let (socket, _) = time::timeout(limit, connect_async(shared.config.gateway_url.as_str()))
        .await
        .map_err(|_| ClientError::Protocol("connect timed out".to_string()))??;

    let (sink, mut stream) = socket.split();
    let (out, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(sink, out_rx));

    let result = drive(shared, commands, &mut stream, &out, established).await;

    // The caller updates the status next; flushing the close frame must
    // not hold that up
    drop(out);
    tokio::spawn(async move {
        let mut writer = writer;
        if time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }
    });
    result
}

async fn write_loop(mut sink: SplitSink<Socket, WsMessage>, mut rx: mpsc::UnboundedReceiver<WsMessage>) {
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, WsMessage::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(error = %e, "Gateway write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn drive(
    shared: &Shared,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    stream: &mut SplitStream<Socket>,
    out: &mpsc::UnboundedSender<WsMessage>,
    established: &mut bool,
) -> ClientResult<SessionEnd> {
    let limit = shared.config.handshake_timeout;
    let token = shared.config.token.as_str();

    let hello = next_frame(stream, limit).await?;
    let interval = hello
        .heartbeat_interval()
        .ok_or_else(|| ClientError::Protocol(format!("expected Hello, got op {}", hello.op)))?;

    match shared.resume_point() {
        Some((session_id, seq)) => {
            debug!(%session_id, seq, "Resuming gateway session");
            send(out, &Frame::resume(token, &session_id, seq))?;
        }
        None => send(out, &Frame::identify(token))?,
    }

    // Replayed dispatches arrive before `resumed` and are handled normally
    loop {
        let frame = next_frame(stream, limit).await?;
        match frame.op {
            op::DISPATCH => {
                if matches!(
                    dispatch(shared, frame),
                    Some(ServerEvent::Ready(_) | ServerEvent::Resumed(_))
                ) {
                    break;
                }
            }
            op::INVALID_SESSION => {
                info!("Session cannot be resumed, identifying");
                shared.clear_session();
                send(out, &Frame::identify(token))?;
            }
            op::RECONNECT => return Ok(SessionEnd::Dropped),
            other => debug!(op = other, "Ignoring frame during handshake"),
        }
    }

    // Frames still queued were accepted by the previous socket. The drain
    // runs before `Connected` is published, so nothing accepted by this
    // socket can be caught in it.
    loop {
        match commands.try_recv() {
            Ok(Command::Shutdown) => return Ok(shutdown(out)),
            Ok(Command::Send(frame)) => debug!(event = ?frame.t, "Dropping stale frame"),
            Ok(Command::Flush) => {}
            Err(_) => break,
        }
    }

    *established = true;
    shared.set_status(ConnectionStatus::Connected);
    info!(session_id = ?shared.session_id(), "Gateway connected");

    for conversation_id in shared.rooms() {
        send(out, &Frame::join(conversation_id))?;
    }
    flush(shared, out)?;

    let period = Duration::from_millis(interval.max(1));
    let mut heartbeat = time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut awaiting_ack = false;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if awaiting_ack {
                    warn!("Heartbeat not acknowledged, reconnecting");
                    return Ok(SessionEnd::Dropped);
                }
                awaiting_ack = true;
                send(out, &Frame::heartbeat(shared.last_sequence()))?;
            }
            command = commands.recv() => match command {
                Some(Command::Send(frame)) => send(out, &frame)?,
                Some(Command::Flush) => flush(shared, out)?,
                Some(Command::Shutdown) | None => return Ok(shutdown(out)),
            },
            message = stream.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(error = %e, "Gateway read failed");
                        return Ok(SessionEnd::Dropped);
                    }
                    None => return Ok(SessionEnd::Dropped),
                };
                match message {
                    WsMessage::Text(text) => {
                        let frame = match Frame::from_json(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, "Undecodable gateway frame");
                                continue;
                            }
                        };
                        match frame.op {
                            op::DISPATCH => {
                                dispatch(shared, frame);
                            }
                            op::HEARTBEAT_ACK => awaiting_ack = false,
                            op::HEARTBEAT => send(out, &Frame::heartbeat(shared.last_sequence()))?,
                            op::RECONNECT => {
                                info!("Gateway asked for a reconnect");
                                return Ok(SessionEnd::Dropped);
                            }
                            op::INVALID_SESSION => {
                                shared.clear_session();
                                return Ok(SessionEnd::Dropped);
                            }
                            other => debug!(op = other, "Ignoring frame"),
                        }
                    }
                    WsMessage::Close(frame) => {
                        return match close_error(frame) {
                            e @ ClientError::Closed { .. } => Err(e),
                            e => {
                                info!(reason = %e, "Gateway closed the socket");
                                Ok(SessionEnd::Dropped)
                            }
                        };
                    }
                    _ => {}
                }
            }
        }
    }
}

fn shutdown(out: &mpsc::UnboundedSender<WsMessage>) -> SessionEnd {
    let _ = out.send(WsMessage::Close(None));
    SessionEnd::Shutdown
}

fn send(out: &mpsc::UnboundedSender<WsMessage>, frame: &Frame) -> ClientResult<()> {
    let text = frame.to_json()?;
    out.send(WsMessage::Text(text))
        .map_err(|_| ClientError::Protocol("gateway writer stopped".to_string()))
}

fn flush(shared: &Shared, out: &mpsc::UnboundedSender<WsMessage>) -> ClientResult<()> {
    let frames = shared.outbox.lock().take_sendable();
    for frame in &frames {
        send(out, frame)?;
    }
    Ok(())
}

/// Record the sequence, settle outbox entries and publish the event
fn dispatch(shared: &Shared, frame: Frame) -> Option<ServerEvent> {
    if let Some(sequence) = frame.s {
        shared.observe_sequence(sequence);
    }
    let Some(name) = frame.t else {
        debug!("Dispatch without an event name");
        return None;
    };
    let event = match ServerEvent::parse(&name, frame.d.unwrap_or(Value::Null)) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = %name, error = %e, "Malformed dispatch");
            return None;
        }
    };

    match &event {
        ServerEvent::Ready(ready) => {
            shared.store_session(ready.session_id.clone(), ready.user.clone());
        }
        ServerEvent::MessageSent(sent) => {
            if let Some(nonce) = sent.nonce.as_deref() {
                shared.outbox.lock().acknowledge(nonce, &sent.message);
            }
        }
        ServerEvent::MessageError(error) => {
            if let Some(nonce) = error.nonce.as_deref() {
                shared.outbox.lock().reject(nonce, &error.code, &error.reason);
            } else {
                debug!(event = %error.event, code = %error.code, "Gateway rejected an event");
            }
        }
        _ => {}
    }

    let _ = shared.events.send(event.clone());
    Some(event)
}

async fn next_frame(stream: &mut SplitStream<Socket>, limit: Duration) -> ClientResult<Frame> {
    loop {
        let message = time::timeout(limit, stream.next())
            .await
            .map_err(|_| ClientError::Protocol("gateway handshake timed out".to_string()))?;
        match message {
            None => return Err(ClientError::Protocol("gateway closed the socket".to_string())),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(WsMessage::Text(text))) => return Ok(Frame::from_json(&text)?),
            Some(Ok(WsMessage::Close(frame))) => return Err(close_error(frame)),
            Some(Ok(_)) => {}
        }
    }
}

/// Fatal close codes become [`ClientError::Closed`]; anything else is a
/// transient protocol error
fn close_error(frame: Option<CloseFrame<'_>>) -> ClientError {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            if FATAL_CLOSE_CODES.contains(&code) {
                ClientError::Closed {
                    code,
                    reason: frame.reason.to_string(),
                }
            } else {
                ClientError::Protocol(format!("gateway closed the socket ({code}): {}", frame.reason))
            }
        }
        None => ClientError::Protocol("gateway closed the socket".to_string()),
    }
}
