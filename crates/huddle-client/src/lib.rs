//! # huddle-client
//!
//! Client side of the Huddle chat surface: an owned gateway
//! [`Connection`] with reconnect and resume, a nonce-correlated send
//! [`Outbox`], state reducers for a conversation and for presence, a
//! typing debouncer, and typed bindings for the REST API.
//!
//! ```no_run
//! use huddle_client::{ClientConfig, Connection};
//! use huddle_core::Snowflake;
//!
//! # async fn demo() -> Result<(), huddle_client::ClientError> {
//! let config = ClientConfig::builder()
//!     .gateway_url("ws://localhost:8081/gateway")
//!     .api_url("http://localhost:8080")
//!     .token("access-token")
//!     .build()?;
//!
//! let connection = Connection::connect(config);
//! connection.wait_until_connected().await?;
//!
//! let _room = connection.join(Snowflake::new(42));
//! let message = connection.send_message(Snowflake::new(42), "salaam").delivered().await?;
//! println!("stored as {}", message.id);
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod connection;
pub mod conversations;
pub mod error;
pub mod model;
pub mod outbox;
pub mod presence;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod typing;

pub use backoff::ReconnectPolicy;
pub use bulk::{run_sequential, BulkProgress};
pub use cache::TtlCache;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use connection::{Connection, ConnectionStatus, RoomSubscription};
pub use conversations::{filter_conversations, ConversationFilter, ConversationPoller, ConversationSource};
pub use error::{ClientError, ClientResult};
pub use outbox::{DeliveryState, Outbox, OutboxEntry, PendingSend};
pub use presence::PresenceCache;
pub use protocol::ServerEvent;
pub use rest::RestClient;
pub use state::ConversationState;
pub use typing::TypingDebouncer;
