//! Conversation entity <-> model mapper

use carechat_core::{Conversation, ConversationKey, DomainError, Snowflake};
use std::collections::HashMap;

use crate::models::ConversationModel;

/// Re-key a JSONB participant map by user id
fn by_participant<V>(raw: HashMap<String, V>) -> Result<HashMap<Snowflake, V>, DomainError> {
    raw.into_iter()
        .map(|(key, value)| {
            Snowflake::parse(&key)
                .map(|id| (id, value))
                .map_err(|_| DomainError::Storage(format!("corrupt participant key: {key}")))
        })
        .collect()
}

impl TryFrom<ConversationModel> for Conversation {
    type Error = DomainError;

    fn try_from(model: ConversationModel) -> Result<Self, Self::Error> {
        let key = ConversationKey::parse(&model.conversation_key)
            .map_err(|e| DomainError::Storage(e.to_string()))?;

        Ok(Conversation {
            id: Snowflake::new(model.id),
            key,
            participants: model.participants.into_iter().map(Snowflake::new).collect(),
            chat_type: model
                .chat_type
                .parse()
                .map_err(|e: DomainError| DomainError::Storage(e.to_string()))?,
            last_message: model.last_message.map(|json| json.0),
            unread_counts: by_participant(model.unread_counts.0)?,
            muted: by_participant(model.muted.0)?,
            pinned: by_participant(model.pinned.0)?,
            is_active: model.is_active,
            started_at: model.started_at,
            last_activity: model.last_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carechat_core::ChatType;
    use chrono::Utc;
    use sqlx::types::Json;

    fn model() -> ConversationModel {
        ConversationModel {
            id: 9,
            conversation_key: "100_200".into(),
            participants: vec![100, 200],
            chat_type: "direct".into(),
            last_message: None,
            unread_counts: Json(HashMap::from([("200".to_string(), 3)])),
            muted: Json(HashMap::from([("100".to_string(), true)])),
            pinned: Json(HashMap::new()),
            is_active: true,
            started_at: Utc::now(),
            last_activity: Utc::now(),
        }
    }

    #[test]
    fn test_maps_participant_maps() {
        let conversation = Conversation::try_from(model()).unwrap();
        assert_eq!(conversation.chat_type, ChatType::Direct);
        assert_eq!(conversation.unread_for(Snowflake::new(200)), 3);
        assert_eq!(conversation.unread_for(Snowflake::new(100)), 0);
        assert!(conversation.is_muted_for(Snowflake::new(100)));
        assert!(!conversation.is_pinned_for(Snowflake::new(100)));
    }

    #[test]
    fn test_corrupt_rows_are_storage_errors() {
        let mut bad_key = model();
        bad_key.conversation_key = "200_100".into();
        assert!(matches!(
            Conversation::try_from(bad_key),
            Err(DomainError::Storage(_))
        ));

        let mut bad_map = model();
        bad_map.unread_counts = Json(HashMap::from([("nobody".to_string(), 1)]));
        assert!(matches!(
            Conversation::try_from(bad_map),
            Err(DomainError::Storage(_))
        ));
    }
}
