//! # huddle-api
//!
//! REST API server built with Axum. Every route lives under `/api/v1`;
//! the probes and the Swagger UI sit at the root.

pub mod docs;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{create_app, create_app_state, run};
pub use state::AppState;
