//! Nonce-correlated send queue
//!
//! Every message goes through the outbox. An entry is written to the
//! socket when the connection is up, re-queued when it drops before the
//! ack, and only leaves the queue on `message_sent`. Failures are kept
//! as [`DeliveryState::Failed`] so the UI can show them and offer a retry.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use huddle_core::Snowflake;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::model::Message;
use crate::protocol::Frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// Waiting for a connection
    Queued,
    /// Written to the socket, no ack yet
    InFlight,
    Failed { code: String, reason: String },
}

#[derive(Debug)]
pub struct OutboxEntry {
    pub nonce: String,
    pub conversation_id: Snowflake,
    pub content: String,
    pub attempts: u32,
    pub state: DeliveryState,
    pub queued_at: DateTime<Utc>,
    waiter: Option<oneshot::Sender<ClientResult<Message>>>,
}

impl OutboxEntry {
    fn settle(&mut self, outcome: ClientResult<Message>) {
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(outcome);
        }
    }

    fn fail(&mut self, error: ClientError) {
        self.state = DeliveryState::Failed {
            code: error.code().to_string(),
            reason: error.to_string(),
        };
        self.settle(Err(error));
    }
}

/// Resolves when the gateway acknowledges or rejects the send
#[derive(Debug)]
pub struct PendingSend {
    nonce: String,
    rx: oneshot::Receiver<ClientResult<Message>>,
}

impl PendingSend {
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub async fn delivered(self) -> ClientResult<Message> {
        self.rx.await.unwrap_or(Err(ClientError::ConnectionClosed))
    }

    /// Outcome if already settled, without waiting
    pub fn try_outcome(&mut self) -> Option<ClientResult<Message>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ClientError::ConnectionClosed)),
        }
    }
}

#[derive(Debug)]
pub struct Outbox {
    entries: VecDeque<OutboxEntry>,
    max_attempts: u32,
}

impl Outbox {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn enqueue(&mut self, conversation_id: Snowflake, content: impl Into<String>) -> PendingSend {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let (tx, rx) = oneshot::channel();
        self.entries.push_back(OutboxEntry {
            nonce: nonce.clone(),
            conversation_id,
            content: content.into(),
            attempts: 0,
            state: DeliveryState::Queued,
            queued_at: Utc::now(),
            waiter: Some(tx),
        });
        PendingSend { nonce, rx }
    }

    /// Frames for every queued entry, oldest first. Entries that used up
    /// their attempts fail instead of being sent again.
    pub fn take_sendable(&mut self) -> Vec<Frame> {
        let max_attempts = self.max_attempts;
        let mut frames = Vec::new();
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.state == DeliveryState::Queued)
        {
            if entry.attempts >= max_attempts {
                warn!(nonce = %entry.nonce, attempts = entry.attempts, "Giving up on message");
                entry.fail(ClientError::MaxAttemptsExceeded {
                    attempts: entry.attempts,
                });
                continue;
            }
            entry.attempts += 1;
            entry.state = DeliveryState::InFlight;
            frames.push(Frame::send_message(
                entry.conversation_id,
                &entry.content,
                &entry.nonce,
            ));
        }
        frames
    }

    /// The socket dropped; unacknowledged sends go back in the queue
    pub fn requeue_in_flight(&mut self) -> usize {
        let mut count = 0;
        for entry in &mut self.entries {
            if entry.state == DeliveryState::InFlight {
                entry.state = DeliveryState::Queued;
                count += 1;
            }
        }
        count
    }

    /// `message_sent` arrived; the entry leaves the outbox
    pub fn acknowledge(&mut self, nonce: &str, message: &Message) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.nonce == nonce) else {
            return false;
        };
        if let Some(mut entry) = self.entries.remove(index) {
            debug!(nonce, message_id = %message.id, "Send acknowledged");
            entry.settle(Ok(message.clone()));
        }
        true
    }

    /// `message_error` arrived for this nonce
    pub fn reject(&mut self, nonce: &str, code: &str, reason: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.nonce == nonce) else {
            return false;
        };
        entry.fail(ClientError::Rejected {
            code: code.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    /// Fail everything still waiting, e.g. when reconnecting gave up
    pub fn fail_pending(&mut self, error: impl Fn() -> ClientError) -> usize {
        let mut count = 0;
        for entry in &mut self.entries {
            if !matches!(entry.state, DeliveryState::Failed { .. }) {
                entry.fail(error());
                count += 1;
            }
        }
        count
    }

    /// Put a failed entry back in the queue with a fresh attempt budget
    pub fn retry(&mut self, nonce: &str) -> Option<PendingSend> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.nonce == nonce && matches!(e.state, DeliveryState::Failed { .. }))?;
        let (tx, rx) = oneshot::channel();
        entry.state = DeliveryState::Queued;
        entry.attempts = 0;
        entry.waiter = Some(tx);
        Some(PendingSend {
            nonce: entry.nonce.clone(),
            rx,
        })
    }

    /// Drop an entry on the user's request
    pub fn discard(&mut self, nonce: &str) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.nonce == nonce) else {
            return false;
        };
        if let Some(mut entry) = self.entries.remove(index) {
            entry.settle(Err(ClientError::ConnectionClosed));
        }
        true
    }

    pub fn get(&self, nonce: &str) -> Option<&OutboxEntry> {
        self.entries.iter().find(|e| e.nonce == nonce)
    }

    pub fn entries(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.iter()
    }

    pub fn failed(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, DeliveryState::Failed { .. }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(id: i64, nonce: &str) -> Message {
        serde_json::from_value(json!({
            "id": id.to_string(),
            "conversation_id": "42",
            "sender_id": "1",
            "content": "salaam",
            "nonce": nonce,
            "created_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_offline_send_stays_pending_until_flushed_and_acked() {
        let mut outbox = Outbox::new(3);
        let mut pending = outbox.enqueue(Snowflake::new(42), "salaam");
        let nonce = pending.nonce().to_string();

        // Nothing has been sent yet; the send must not look successful
        assert!(pending.try_outcome().is_none());
        assert_eq!(outbox.get(&nonce).unwrap().state, DeliveryState::Queued);

        // Reconnect flushes
        let frames = outbox.take_sendable();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].d.as_ref().unwrap()["nonce"], nonce.as_str());
        assert!(outbox.take_sendable().is_empty());

        assert!(outbox.acknowledge(&nonce, &stored(900, &nonce)));
        assert!(outbox.is_empty());
        assert_eq!(pending.delivered().await.unwrap().id, Snowflake::new(900));
    }

    #[tokio::test]
    async fn test_drop_before_ack_resends_with_the_same_nonce() {
        let mut outbox = Outbox::new(3);
        let pending = outbox.enqueue(Snowflake::new(42), "salaam");

        let first = outbox.take_sendable();
        assert_eq!(outbox.requeue_in_flight(), 1);
        let second = outbox.take_sendable();
        assert_eq!(first, second);
        assert_eq!(outbox.get(pending.nonce()).unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded_and_failure_is_explicit() {
        let mut outbox = Outbox::new(2);
        let pending = outbox.enqueue(Snowflake::new(42), "salaam");
        let nonce = pending.nonce().to_string();

        for _ in 0..2 {
            assert_eq!(outbox.take_sendable().len(), 1);
            outbox.requeue_in_flight();
        }
        assert!(outbox.take_sendable().is_empty());

        let entry = outbox.get(&nonce).unwrap();
        assert!(matches!(entry.state, DeliveryState::Failed { ref code, .. } if code == "MAX_ATTEMPTS_EXCEEDED"));
        assert!(matches!(
            pending.delivered().await,
            Err(ClientError::MaxAttemptsExceeded { attempts: 2 })
        ));
        assert_eq!(outbox.failed().count(), 1);
    }

    #[tokio::test]
    async fn test_message_error_rejects_and_retry_requeues() {
        let mut outbox = Outbox::new(3);
        let pending = outbox.enqueue(Snowflake::new(42), "salaam");
        let nonce = pending.nonce().to_string();
        outbox.take_sendable();

        assert!(outbox.reject(&nonce, "NOT_PARTICIPANT", "You are not in this conversation"));
        let err = pending.delivered().await.unwrap_err();
        assert_eq!(err.code(), "NOT_PARTICIPANT");

        let retried = outbox.retry(&nonce).unwrap();
        assert_eq!(retried.nonce(), nonce);
        assert_eq!(outbox.take_sendable().len(), 1);
        assert!(outbox.retry(&nonce).is_none());
    }

    #[tokio::test]
    async fn test_unknown_nonces_are_ignored() {
        let mut outbox = Outbox::new(3);
        assert!(!outbox.acknowledge("missing", &stored(1, "missing")));
        assert!(!outbox.reject("missing", "X", "y"));
        assert!(!outbox.discard("missing"));
    }

    #[tokio::test]
    async fn test_fail_pending_settles_waiters() {
        let mut outbox = Outbox::new(3);
        let a = outbox.enqueue(Snowflake::new(1), "a");
        let b = outbox.enqueue(Snowflake::new(1), "b");
        outbox.take_sendable();

        assert_eq!(outbox.fail_pending(|| ClientError::ReconnectFailed { attempts: 4 }), 2);
        assert!(matches!(a.delivered().await, Err(ClientError::ReconnectFailed { .. })));
        assert!(matches!(b.delivered().await, Err(ClientError::ReconnectFailed { .. })));
        assert_eq!(outbox.len(), 2);
    }
}
