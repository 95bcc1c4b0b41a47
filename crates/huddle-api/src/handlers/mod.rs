//! Route handlers, one module per resource

pub mod auth;
pub mod conversations;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod users;
