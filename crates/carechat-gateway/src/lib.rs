//! # carechat-gateway
//!
//! WebSocket gateway: authenticated connections, presence, client events
//! routed to the messaging services, and chat event fan-out.

pub mod broadcast;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{
    connect_backends, create_gateway_state, gateway_router, run, Backends, GatewayState,
};
