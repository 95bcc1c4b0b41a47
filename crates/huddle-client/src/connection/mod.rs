//! Gateway connection
//!
//! [`Connection`] is an owned, cloneable handle to one supervised socket.
//! The supervisor task identifies, resumes after drops, keeps heartbeats
//! going and routes acks into the outbox. Dropping the last handle shuts
//! it down.

mod handle;
mod shared;
mod supervisor;

pub use handle::{Connection, RoomSubscription};
pub use shared::ConnectionStatus;
