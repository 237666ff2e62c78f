//! Presence registry port
//!
//! Tracks which users have live sessions and what status they advertise. The
//! gateway keeps the actual socket handles; this registry only knows session ids,
//! so it can live in process memory or in a shared cache.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::entities::PresenceStatus;
use crate::traits::RepoResult;
use crate::value_objects::Snowflake;

#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Add a live session. Returns true when this is the user's first session.
    async fn register(&self, user_id: Snowflake, session_id: &str) -> RepoResult<bool>;

    /// Drop a session. Returns true when the user has no sessions left.
    async fn unregister(&self, user_id: Snowflake, session_id: &str) -> RepoResult<bool>;

    /// Keep a live session from expiring. Registries without expiry ignore it.
    async fn refresh(&self, _user_id: Snowflake, _session_id: &str) -> RepoResult<()> {
        Ok(())
    }

    async fn sessions(&self, user_id: Snowflake) -> RepoResult<Vec<String>>;

    async fn set_status(&self, user_id: Snowflake, status: PresenceStatus) -> RepoResult<()>;

    /// Users never seen are `Offline`
    async fn status(&self, user_id: Snowflake) -> RepoResult<PresenceStatus>;

    async fn statuses(
        &self,
        user_ids: &[Snowflake],
    ) -> RepoResult<HashMap<Snowflake, PresenceStatus>> {
        let mut out = HashMap::with_capacity(user_ids.len());
        for id in user_ids {
            out.insert(*id, self.status(*id).await?);
        }
        Ok(out)
    }
}
