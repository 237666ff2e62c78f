//! Connection management
//!
//! Live WebSocket connections, the rooms they joined and event delivery.

mod connection;
mod manager;
mod session;

pub use connection::{Connection, Outbound, SendError};
pub use manager::ConnectionManager;
pub use session::Session;
