//! Test fixtures and data generators
//!
//! Request bodies and a seeded cast of directory users.

use anyhow::Result;
use carechat_core::{Snowflake, User, UserRole};
use serde::Serialize;
use serde_json::{json, Value};

use crate::helpers::TestServer;

/// Body of `POST /messages`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub recipient_id: String,
    pub content: String,
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl SendMessageBody {
    pub fn text(recipient: Snowflake, content: &str) -> Self {
        Self {
            recipient_id: recipient.to_string(),
            content: content.to_string(),
            message_type: "text".to_string(),
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, message_id: &str) -> Self {
        self.reply_to = Some(message_id.to_string());
        self
    }
}

pub fn status_body(status: &str) -> Value {
    json!({ "status": status })
}

pub fn edit_body(content: &str) -> Value {
    json!({ "content": content })
}

pub fn reaction_body(emoji: &str) -> Value {
    json!({ "emoji": emoji })
}

/// A mom talking to a doctor, with a midwife around for third-party checks
pub struct Cast {
    pub mom: User,
    pub mom_token: String,
    pub doctor: User,
    pub doctor_token: String,
    pub midwife: User,
    pub midwife_token: String,
}

impl Cast {
    pub fn seed(server: &TestServer) -> Result<Self> {
        let (mom, mom_token) = server.user("Ada Mom", UserRole::Mom)?;
        let (doctor, doctor_token) = server.user("Dr Bea", UserRole::Doctor)?;
        let (midwife, midwife_token) = server.user("Cleo Midwife", UserRole::Midwife)?;
        Ok(Self {
            mom,
            mom_token,
            doctor,
            doctor_token,
            midwife,
            midwife_token,
        })
    }
}
