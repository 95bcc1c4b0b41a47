//! Owned connection handle and room subscriptions

use std::sync::Arc;

use huddle_core::{PresenceStatus, Snowflake};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

use super::shared::{Command, ConnectionStatus, Shared};
use super::supervisor::supervise;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::model::User;
use crate::outbox::PendingSend;
use crate::protocol::{names, Frame, ServerEvent};
use crate::typing::TypingDebouncer;

/// Cloneable sender half used by the handle, subscriptions and debouncers
#[derive(Debug, Clone)]
struct Emitter {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Emitter {
    fn emit(&self, frame: Frame) -> ClientResult<()> {
        self.shared.send_if_connected(&self.commands, frame)
    }

    fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }
}

#[derive(Debug)]
struct Inner {
    emitter: Emitter,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.emitter.commands.send(Command::Shutdown);
    }
}

/// Handle to a supervised gateway socket. Clones share the socket; when
/// the last clone is dropped the socket is closed.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Start connecting in the background. Must be called inside a tokio
    /// runtime; use [`Connection::wait_until_connected`] to await the
    /// handshake.
    pub fn connect(config: ClientConfig) -> Self {
        let shared = Arc::new(Shared::new(config));
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(supervise(Arc::clone(&shared), rx));
        Self {
            inner: Arc::new(Inner {
                emitter: Emitter { shared, commands },
            }),
        }
    }

    fn shared(&self) -> &Shared {
        &self.inner.emitter.shared
    }

    pub async fn wait_until_connected(&self) -> ClientResult<()> {
        let mut status = self.shared().watch_status();
        loop {
            {
                let current = status.borrow_and_update();
                if *current == ConnectionStatus::Connected {
                    return Ok(());
                }
                if let Some(error) = current.error() {
                    return Err(error);
                }
            }
            status
                .changed()
                .await
                .map_err(|_| ClientError::ConnectionClosed)?;
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared().status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared().watch_status()
    }

    /// Every dispatch from now on, including acks and presence
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared().events.subscribe()
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared().session_id()
    }

    /// The identified user, once `ready` has arrived
    pub fn user(&self) -> Option<User> {
        self.shared().user()
    }

    /// Join a conversation room for as long as the subscription lives.
    /// Rooms are rejoined after every reconnect.
    pub fn join(&self, conversation_id: Snowflake) -> RoomSubscription {
        if self.shared().add_room(conversation_id) {
            if let Err(e) = self.inner.emitter.emit(Frame::join(conversation_id)) {
                debug!(%conversation_id, error = %e, "Join deferred until connected");
            }
        }
        RoomSubscription {
            emitter: self.inner.emitter.clone(),
            conversation_id,
        }
    }

    /// Queue a message. The returned handle resolves on `message_sent`,
    /// or with an error on `message_error` or when delivery is abandoned.
    pub fn send_message(&self, conversation_id: Snowflake, content: impl Into<String>) -> PendingSend {
        let pending = {
            let mut outbox = self.shared().outbox.lock();
            let pending = outbox.enqueue(conversation_id, content);
            if let Some(error) = self.shared().status().error() {
                let code = error.code().to_string();
                let reason = error.to_string();
                outbox.reject(pending.nonce(), &code, &reason);
            }
            pending
        };
        self.inner.emitter.flush();
        pending
    }

    /// Queue a failed send again
    pub fn retry_send(&self, nonce: &str) -> Option<PendingSend> {
        let pending = self.shared().outbox.lock().retry(nonce)?;
        self.inner.emitter.flush();
        Some(pending)
    }

    /// Give up on a queued or failed send
    pub fn discard_send(&self, nonce: &str) -> bool {
        self.shared().outbox.lock().discard(nonce)
    }

    /// Nonces of sends that failed and wait for a retry or discard
    pub fn failed_sends(&self) -> Vec<String> {
        self.shared()
            .outbox
            .lock()
            .failed()
            .map(|e| e.nonce.clone())
            .collect()
    }

    pub fn pending_sends(&self) -> usize {
        self.shared().outbox.lock().len()
    }

    pub fn edit_message(&self, message_id: Snowflake, content: &str) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::event(
            names::EDIT_MESSAGE,
            json!({ "message_id": message_id, "content": content }),
        ))
    }

    pub fn delete_message(&self, message_id: Snowflake) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::event(
            names::DELETE_MESSAGE,
            json!({ "message_id": message_id }),
        ))
    }

    pub fn add_reaction(&self, message_id: Snowflake, emoji: &str) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::event(
            names::ADD_REACTION,
            json!({ "message_id": message_id, "emoji": emoji }),
        ))
    }

    pub fn remove_reaction(&self, message_id: Snowflake, emoji: &str) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::event(
            names::REMOVE_REACTION,
            json!({ "message_id": message_id, "emoji": emoji }),
        ))
    }

    /// `None` toggles the current pin state
    pub fn pin_message(&self, message_id: Snowflake, pinned: Option<bool>) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::event(
            names::PIN_MESSAGE,
            json!({ "message_id": message_id, "pinned": pinned }),
        ))
    }

    pub fn set_typing(&self, conversation_id: Snowflake, is_typing: bool) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::typing(conversation_id, is_typing))
    }

    pub fn set_status(&self, status: PresenceStatus, custom_status: Option<&str>) -> ClientResult<()> {
        self.inner.emitter.emit(Frame::event(
            names::STATUS_UPDATE,
            json!({ "status": status, "custom_status": custom_status }),
        ))
    }

    /// Debouncer that sends `typing` for `conversation_id` over this
    /// connection. Keystrokes while offline are dropped.
    pub fn typing_debouncer(&self, conversation_id: Snowflake) -> TypingDebouncer {
        let emitter = self.inner.emitter.clone();
        TypingDebouncer::spawn(self.shared().config.typing_timeout, move |is_typing| {
            if let Err(e) = emitter.emit(Frame::typing(conversation_id, is_typing)) {
                debug!(%conversation_id, error = %e, "Typing signal not sent");
            }
        })
    }

    /// Close the socket now, without waiting for the last handle to drop
    pub fn close(&self) {
        let _ = self.inner.emitter.commands.send(Command::Shutdown);
    }
}

/// Membership of one conversation room; dropping it leaves the room once
/// no other subscription for the same conversation remains
#[derive(Debug)]
#[must_use = "the room is left as soon as the subscription is dropped"]
pub struct RoomSubscription {
    emitter: Emitter,
    conversation_id: Snowflake,
}

impl RoomSubscription {
    pub fn conversation_id(&self) -> Snowflake {
        self.conversation_id
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        if self.emitter.shared.remove_room(self.conversation_id) {
            if let Err(e) = self.emitter.emit(Frame::leave(self.conversation_id)) {
                debug!(conversation_id = %self.conversation_id, error = %e, "Leave not sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::Value;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::WebSocketStream;

    use crate::backoff::ReconnectPolicy;
    use crate::protocol::op;

    type Server = WebSocketStream<TcpStream>;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(addr: std::net::SocketAddr, max_attempts: u32) -> ClientConfig {
        ClientConfig::builder()
            .gateway_url(format!("ws://{addr}/gateway"))
            .token("token-a")
            .reconnect(ReconnectPolicy::new(
                Duration::from_millis(10),
                Duration::from_millis(50),
                max_attempts,
            ))
            .handshake_timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    async fn accept(listener: &TcpListener) -> Server {
        let (tcp, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        tokio_tungstenite::accept_async(tcp).await.unwrap()
    }

    async fn push(ws: &mut Server, frame: Value) {
        ws.send(WsMessage::Text(frame.to_string())).await.unwrap();
    }

    /// Next client frame, skipping heartbeats
    async fn next(ws: &mut Server) -> Frame {
        loop {
            let message = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
            if let WsMessage::Text(text) = message {
                let frame = Frame::from_json(&text).unwrap();
                if frame.op != op::HEARTBEAT {
                    return frame;
                }
            }
        }
    }

    async fn hello(ws: &mut Server) {
        push(ws, json!({"op": 10, "d": {"heartbeat_interval": 60_000}})).await;
    }

    fn ready(seq: u64, session_id: &str) -> Value {
        json!({
            "op": 0, "t": "ready", "s": seq,
            "d": {
                "v": 1,
                "session_id": session_id,
                "user": {"id": "1", "username": "amina"},
                "conversations": []
            }
        })
    }

    fn receive(seq: u64, id: &str, content: &str) -> Value {
        json!({
            "op": 0, "t": "receive_message", "s": seq,
            "d": {
                "id": id, "conversation_id": "42", "sender_id": "2",
                "content": content, "created_at": "2026-03-01T10:00:00Z"
            }
        })
    }

    #[tokio::test]
    async fn test_identify_join_send_and_leave_on_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Connection::connect(config(listener.local_addr().unwrap(), 3));
        let mut events = connection.subscribe();

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        let identify = next(&mut ws).await;
        assert_eq!(identify.op, op::IDENTIFY);
        assert_eq!(identify.d.unwrap()["token"], "token-a");

        push(&mut ws, ready(1, "sess-1")).await;
        timeout(WAIT, connection.wait_until_connected()).await.unwrap().unwrap();
        assert_eq!(connection.session_id().as_deref(), Some("sess-1"));
        assert_eq!(connection.user().unwrap().username, "amina");

        let room = connection.join(Snowflake::new(42));
        let second = connection.join(Snowflake::new(42));
        let join = next(&mut ws).await;
        assert_eq!(join.t.as_deref(), Some(names::JOIN_CONVERSATION));
        assert_eq!(join.d.unwrap()["conversation_id"], "42");

        push(&mut ws, receive(2, "10", "hello")).await;
        let received = timeout(WAIT, async {
            loop {
                if let ServerEvent::ReceiveMessage(m) = events.recv().await.unwrap() {
                    return m;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(received.content, "hello");
        assert_eq!(received.sender_id, Snowflake::new(2));

        let pending = connection.send_message(Snowflake::new(42), "salaam");
        let send = next(&mut ws).await;
        assert_eq!(send.t.as_deref(), Some(names::SEND_MESSAGE));
        let nonce = send.d.unwrap()["nonce"].as_str().unwrap().to_string();
        assert_eq!(nonce, pending.nonce());

        push(
            &mut ws,
            json!({
                "op": 0, "t": "message_sent", "s": 3,
                "d": {
                    "nonce": nonce,
                    "message": {
                        "id": "900", "conversation_id": "42", "sender_id": "1",
                        "content": "salaam", "nonce": nonce,
                        "created_at": "2026-03-01T10:00:01Z"
                    }
                }
            }),
        )
        .await;
        let stored = timeout(WAIT, pending.delivered()).await.unwrap().unwrap();
        assert_eq!(stored.id, Snowflake::new(900));
        assert_eq!(connection.pending_sends(), 0);

        // One of two subscriptions going away keeps the room
        drop(second);
        drop(room);
        let leave = next(&mut ws).await;
        assert_eq!(leave.t.as_deref(), Some(names::LEAVE_CONVERSATION));
        assert_eq!(leave.d.unwrap()["conversation_id"], "42");
    }

    #[tokio::test]
    async fn test_dropped_socket_resumes_rejoins_and_flushes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Connection::connect(config(listener.local_addr().unwrap(), 5));

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        next(&mut ws).await;
        push(&mut ws, ready(1, "sess-1")).await;
        timeout(WAIT, connection.wait_until_connected()).await.unwrap().unwrap();

        let _room = connection.join(Snowflake::new(42));
        next(&mut ws).await;
        push(&mut ws, receive(2, "10", "hello")).await;

        // Wait for the client to see sequence 2, then cut the socket
        timeout(WAIT, async {
            while connection.shared().last_sequence() != Some(2) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        drop(ws);

        let pending = connection.send_message(Snowflake::new(42), "sent while offline");

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        let resume = next(&mut ws).await;
        assert_eq!(resume.op, op::RESUME);
        let d = resume.d.unwrap();
        assert_eq!(d["session_id"], "sess-1");
        assert_eq!(d["seq"], 2);
        assert_eq!(d["token"], "token-a");

        push(
            &mut ws,
            json!({"op": 0, "t": "resumed", "s": 3, "d": {"session_id": "sess-1", "replayed": 0}}),
        )
        .await;
        timeout(WAIT, connection.wait_until_connected()).await.unwrap().unwrap();

        let rejoin = next(&mut ws).await;
        assert_eq!(rejoin.t.as_deref(), Some(names::JOIN_CONVERSATION));
        let flushed = next(&mut ws).await;
        assert_eq!(flushed.t.as_deref(), Some(names::SEND_MESSAGE));
        assert_eq!(flushed.d.unwrap()["nonce"], pending.nonce());
    }

    #[tokio::test]
    async fn test_events_accepted_at_connect_reach_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Connection::connect(config(listener.local_addr().unwrap(), 3));

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        next(&mut ws).await;
        push(&mut ws, ready(1, "sess-1")).await;

        // Emit the moment the status flips, before the supervisor settles
        let mut status = connection.watch_status();
        timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Connected))
            .await
            .unwrap()
            .unwrap();
        connection.edit_message(Snowflake::new(10), "fixed typo").unwrap();
        connection.pin_message(Snowflake::new(10), Some(true)).unwrap();

        let edit = next(&mut ws).await;
        assert_eq!(edit.t.as_deref(), Some(names::EDIT_MESSAGE));
        let pin = next(&mut ws).await;
        assert_eq!(pin.t.as_deref(), Some(names::PIN_MESSAGE));
    }

    #[tokio::test]
    async fn test_events_after_socket_loss_are_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Connection::connect(config(listener.local_addr().unwrap(), 5));

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        next(&mut ws).await;
        push(&mut ws, ready(1, "sess-1")).await;
        timeout(WAIT, connection.wait_until_connected()).await.unwrap().unwrap();
        drop(ws);

        let mut status = connection.watch_status();
        timeout(WAIT, status.wait_for(|s| *s != ConnectionStatus::Connected))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            connection.add_reaction(Snowflake::new(10), "👍"),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_invalid_session_falls_back_to_identify() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Connection::connect(config(listener.local_addr().unwrap(), 5));

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        next(&mut ws).await;
        push(&mut ws, ready(1, "sess-1")).await;
        timeout(WAIT, connection.wait_until_connected()).await.unwrap().unwrap();
        drop(ws);

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        assert_eq!(next(&mut ws).await.op, op::RESUME);
        push(&mut ws, json!({"op": 9, "d": false})).await;
        assert_eq!(next(&mut ws).await.op, op::IDENTIFY);
        push(&mut ws, ready(1, "sess-2")).await;

        timeout(WAIT, async {
            while connection.session_id().as_deref() != Some("sess-2") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(connection.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_exhausted_reconnects_fail_pending_sends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connection = Connection::connect(config(addr, 2));
        let pending = connection.send_message(Snowflake::new(42), "never delivered");

        let err = timeout(WAIT, connection.wait_until_connected())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ClientError::ReconnectFailed { attempts: 2 }));
        assert!(matches!(
            timeout(WAIT, pending.delivered()).await.unwrap(),
            Err(ClientError::ReconnectFailed { .. })
        ));
        assert_eq!(connection.failed_sends().len(), 1);

        // Sending after the failure is refused straight away
        let late = connection.send_message(Snowflake::new(42), "too late");
        assert!(timeout(WAIT, late.delivered()).await.unwrap().is_err());
        assert!(matches!(
            connection.edit_message(Snowflake::new(1), "x"),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connection = Connection::connect(config(listener.local_addr().unwrap(), 5));

        let mut ws = accept(&listener).await;
        hello(&mut ws).await;
        next(&mut ws).await;
        ws.close(Some(CloseFrame {
            code: CloseCode::from(4004),
            reason: "Authentication failed".into(),
        }))
        .await
        .unwrap();

        let err = timeout(WAIT, connection.wait_until_connected())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed { code: 4004, .. }));
        assert!(matches!(connection.status(), ConnectionStatus::Rejected { code: 4004, .. }));
    }
}
