//! Directory service - finding someone to talk to

use carechat_core::{ConversationKey, Snowflake, UserRole};
use tracing::instrument;

use crate::dto::{UserPresence, UserSearchResult, UserSummary};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

pub struct DirectoryService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> DirectoryService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Case-insensitive search over name, specialty and email, excluding the
    /// caller. Each hit says whether the caller already talks to that user.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        user_id: Snowflake,
        query: &str,
        role: Option<&str>,
    ) -> ServiceResult<Vec<UserSearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::validation("search query must not be empty"));
        }
        let role = role
            .filter(|r| !r.trim().is_empty())
            .map(|r| r.trim().parse::<UserRole>())
            .transpose()?;

        let limit = self.ctx.chat_config().search_limit;
        let users = self
            .ctx
            .user_directory()
            .search(query, role, user_id, limit)
            .await?;

        let mut results = Vec::with_capacity(users.len());
        for user in users {
            let key = ConversationKey::resolve(user_id, user.id);
            let existing = self.ctx.conversation_repo().find_by_key(&key).await?;
            results.push(UserSearchResult {
                user: UserSummary::from(&user),
                email: user.email,
                has_existing_chat: existing.is_some(),
                conversation_id: existing.map(|c| c.id),
            });
        }
        Ok(results)
    }

    /// Doctors and midwives, or just one of the two, sorted by name with
    /// their live presence
    #[instrument(skip(self))]
    pub async fn list_providers(
        &self,
        user_id: Snowflake,
        role: Option<&str>,
    ) -> ServiceResult<Vec<UserPresence>> {
        let roles = match role.map(str::trim).filter(|r| !r.is_empty()) {
            None => UserRole::PROVIDERS.to_vec(),
            Some(raw) => {
                let role = raw.parse::<UserRole>()?;
                if !role.is_provider() {
                    return Err(ServiceError::validation(format!(
                        "role must be doctor or midwife, got {role}"
                    )));
                }
                vec![role]
            }
        };

        let users = self
            .ctx
            .user_directory()
            .list_by_roles(&roles, user_id)
            .await?;
        let ids: Vec<Snowflake> = users.iter().map(|u| u.id).collect();
        let statuses = self.ctx.presence().statuses(&ids).await?;

        Ok(users
            .iter()
            .map(|user| UserPresence {
                user: UserSummary::from(user),
                status: statuses.get(&user.id).copied().unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::SendMessageRequest;
    use crate::services::MessagingService;
    use crate::testing::TestContext;
    use carechat_core::{MessageType, PresenceRegistry, PresenceStatus, User};

    fn seeded() -> (TestContext, User) {
        let env = TestContext::new();
        let mom = env.add_user("Ada Lovelace", UserRole::Mom);
        env.users.insert(
            User::new(Snowflake::new(9001), "Zoe Park".into(), "zoe@clinic.test".into(), UserRole::Doctor)
                .with_specialty("Pediatrics"),
        );
        env.users.insert(
            User::new(Snowflake::new(9002), "Amira Hale".into(), "amira@birth.test".into(), UserRole::Midwife),
        );
        env.users.insert(
            User::new(Snowflake::new(9003), "Ben Ortiz".into(), "ben@clinic.test".into(), UserRole::Doctor)
                .with_specialty("Obstetrics"),
        );
        env.users.insert(
            User::new(Snowflake::new(9004), "Cara Mom".into(), "cara@home.test".into(), UserRole::Mom),
        );
        (env, mom)
    }

    #[tokio::test]
    async fn test_search_matches_name_specialty_and_email() {
        let (env, mom) = seeded();
        let service = DirectoryService::new(&env.ctx);

        let by_specialty = service.search(mom.id, "PEDIA", None).await.unwrap();
        assert_eq!(by_specialty.len(), 1);
        assert_eq!(by_specialty[0].user.display_name, "Zoe Park");

        let by_email = service.search(mom.id, "clinic.test", None).await.unwrap();
        assert_eq!(by_email.len(), 2);

        let doctors_only = service.search(mom.id, "a", Some("doctor")).await.unwrap();
        assert!(doctors_only.iter().all(|r| r.user.role == UserRole::Doctor));

        // The caller never finds themselves
        let me = service.search(mom.id, "lovelace", None).await.unwrap();
        assert!(me.is_empty());
    }

    #[tokio::test]
    async fn test_search_flags_existing_chats() {
        let (env, mom) = seeded();
        let sent = MessagingService::new(&env.ctx)
            .send_message(
                mom.id,
                SendMessageRequest {
                    recipient_id: Snowflake::new(9003),
                    content: "hi".into(),
                    message_type: MessageType::Text,
                    reply_to: None,
                    attachment: None,
                },
            )
            .await
            .unwrap();

        let results = DirectoryService::new(&env.ctx)
            .search(mom.id, "clinic", None)
            .await
            .unwrap();
        let ben = results.iter().find(|r| r.user.id == Snowflake::new(9003)).unwrap();
        assert!(ben.has_existing_chat);
        assert_eq!(ben.conversation_id, Some(sent.conversation_id));
        let zoe = results.iter().find(|r| r.user.id == Snowflake::new(9001)).unwrap();
        assert!(!zoe.has_existing_chat);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let (env, mom) = seeded();
        let service = DirectoryService::new(&env.ctx);

        let err = service.search(mom.id, "  ", None).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = service.search(mom.id, "zoe", Some("nurse")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_search_is_capped() {
        let env = TestContext::new();
        let mom = env.add_user("Ada", UserRole::Mom);
        for i in 0..25 {
            env.add_user(&format!("Doctor {i:02}"), UserRole::Doctor);
        }
        let results = DirectoryService::new(&env.ctx)
            .search(mom.id, "doctor", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 20);
    }

    #[tokio::test]
    async fn test_providers_sorted_with_presence() {
        let (env, mom) = seeded();
        env.presence.register(Snowflake::new(9003), "s1").await.unwrap();
        let service = DirectoryService::new(&env.ctx);

        let all = service.list_providers(mom.id, None).await.unwrap();
        let names: Vec<_> = all.iter().map(|p| p.user.display_name.as_str()).collect();
        assert_eq!(names, ["Amira Hale", "Ben Ortiz", "Zoe Park"]);
        assert_eq!(all[1].status, PresenceStatus::Online);
        assert_eq!(all[0].status, PresenceStatus::Offline);

        let midwives = service.list_providers(mom.id, Some("midwife")).await.unwrap();
        assert_eq!(midwives.len(), 1);

        let err = service.list_providers(mom.id, Some("mom")).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
