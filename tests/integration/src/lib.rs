//! Integration test utilities for the Huddle servers
//!
//! Spawns the REST API and the gateway on ephemeral ports and offers
//! HTTP helpers, a raw gateway client and fixtures on top.

pub mod fixtures;
pub mod gateway;
pub mod helpers;

pub use fixtures::*;
pub use gateway::GatewayClient;
pub use helpers::*;
