//! Server payloads that are not chat events

use carechat_core::Snowflake;
use serde::{Deserialize, Serialize};

/// Hello payload (op=10)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Interval in milliseconds at which the client should heartbeat
    pub heartbeat_interval: u64,
    pub session_id: String,
    pub user_id: Snowflake,
}
