//! State shared between the handle and the supervisor task

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use huddle_core::Snowflake;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::model::User;
use crate::outbox::Outbox;
use crate::protocol::{Frame, ServerEvent};

const EVENT_BUFFER: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Waiting before reconnect attempt `attempt`
    Reconnecting { attempt: u32 },
    /// Shut down by the owner
    Closed,
    /// Reconnect attempts used up
    Failed { attempts: u32 },
    /// The gateway refused the session for good
    Rejected { code: u16, reason: String },
}

impl ConnectionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed { .. } | Self::Rejected { .. })
    }

    /// Error matching a terminal status
    pub fn error(&self) -> Option<ClientError> {
        match self {
            Self::Closed => Some(ClientError::ConnectionClosed),
            Self::Failed { attempts } => Some(ClientError::ReconnectFailed {
                attempts: *attempts,
            }),
            Self::Rejected { code, reason } => Some(ClientError::Closed {
                code: *code,
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Send(Frame),
    /// Write whatever the outbox has queued
    Flush,
    Shutdown,
}

#[derive(Debug, Clone)]
struct Session {
    id: String,
    user: User,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    status: watch::Sender<ConnectionStatus>,
    pub(crate) events: broadcast::Sender<ServerEvent>,
    pub(crate) outbox: Mutex<Outbox>,
    /// Joined conversations with their subscription counts
    rooms: Mutex<HashMap<Snowflake, usize>>,
    session: RwLock<Option<Session>>,
    last_sequence: AtomicU64,
}

impl Shared {
    pub(crate) fn new(config: ClientConfig) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let outbox = Outbox::new(config.outbox_max_attempts);
        Self {
            config,
            status,
            events,
            outbox: Mutex::new(outbox),
            rooms: Mutex::new(HashMap::new()),
            session: RwLock::new(None),
            last_sequence: AtomicU64::new(0),
        }
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    pub(crate) fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Queue `frame` for the socket, but only while connected. The status
    /// stays borrowed until the frame is queued, so the supervisor cannot
    /// move away from `Connected` in between.
    pub(crate) fn send_if_connected(
        &self,
        commands: &mpsc::UnboundedSender<Command>,
        frame: Frame,
    ) -> ClientResult<()> {
        let status = self.status.borrow();
        if *status != ConnectionStatus::Connected {
            return Err(ClientError::NotConnected);
        }
        commands
            .send(Command::Send(frame))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Count a subscription; true when it is the first for the room
    pub(crate) fn add_room(&self, conversation_id: Snowflake) -> bool {
        let mut rooms = self.rooms.lock();
        let count = rooms.entry(conversation_id).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop a subscription; true when it was the last for the room
    pub(crate) fn remove_room(&self, conversation_id: Snowflake) -> bool {
        let mut rooms = self.rooms.lock();
        match rooms.get_mut(&conversation_id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                rooms.remove(&conversation_id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn rooms(&self) -> Vec<Snowflake> {
        let mut rooms: Vec<Snowflake> = self.rooms.lock().keys().copied().collect();
        rooms.sort_unstable();
        rooms
    }

    pub(crate) fn store_session(&self, id: String, user: User) {
        *self.session.write() = Some(Session { id, user });
    }

    /// Forget the session; the next handshake identifies from scratch
    pub(crate) fn clear_session(&self) {
        *self.session.write() = None;
        self.last_sequence.store(0, Ordering::SeqCst);
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.id.clone())
    }

    pub(crate) fn user(&self) -> Option<User> {
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    /// Session id and last sequence to resume from
    pub(crate) fn resume_point(&self) -> Option<(String, u64)> {
        self.session_id()
            .map(|id| (id, self.last_sequence.load(Ordering::SeqCst)))
    }

    pub(crate) fn observe_sequence(&self, sequence: u64) {
        self.last_sequence.fetch_max(sequence, Ordering::SeqCst);
    }

    pub(crate) fn last_sequence(&self) -> Option<u64> {
        match self.last_sequence.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }
}
