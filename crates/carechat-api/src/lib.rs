//! # carechat-api
//!
//! REST API server built with Axum. The WebSocket gateway is mounted on the
//! same listener so REST-triggered events reach open sockets in-process.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{create_app, run, serve};
pub use state::AppState;
