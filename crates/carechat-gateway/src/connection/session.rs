//! The identity a routed client event acts under

use carechat_core::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub user_id: Snowflake,
}

impl Session {
    pub fn new(session_id: impl Into<String>, user_id: Snowflake) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
        }
    }

    #[must_use]
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
