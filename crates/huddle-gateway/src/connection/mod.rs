//! Connection management
//!
//! Live WebSocket connections, the rooms they joined and session ids.

mod connection;
mod manager;
mod room;
mod session;

pub use connection::{Connection, ConnectionState};
pub use manager::ConnectionManager;
pub use room::{RoomGuard, RoomIndex};
pub use session::generate_session_id;
