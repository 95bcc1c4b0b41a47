//! # huddle-gateway
//!
//! WebSocket gateway for real-time chat. Clients identify with their
//! access token, join conversation rooms, and exchange named events;
//! everything the services publish on Redis is fanned out here.

pub mod broadcast;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{create_app, create_gateway_state, run, GatewayState};
