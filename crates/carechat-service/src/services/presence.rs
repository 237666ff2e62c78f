//! Presence service
//!
//! Tracks live sessions through the injected [`PresenceRegistry`] and
//! broadcasts `user_status_change` when a user comes online, steps away,
//! comes back, or drops their last connection.
//!
//! [`PresenceRegistry`]: carechat_core::PresenceRegistry

use carechat_core::{ChatEventKind, PresenceStatus, Snowflake};
use serde::Serialize;
use tracing::{info, instrument};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::events;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusChange {
    user_id: Snowflake,
    status: PresenceStatus,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Presence service
pub struct PresenceService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PresenceService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a session; the first one marks the user online.
    ///
    /// Returns true when this was the user's first live session.
    #[instrument(skip(self))]
    pub async fn connect(&self, user_id: Snowflake, session_id: &str) -> ServiceResult<bool> {
        let first = self.ctx.presence().register(user_id, session_id).await?;
        if first {
            info!(user_id = %user_id, "User came online");
            self.announce(user_id, PresenceStatus::Online).await;
        }
        Ok(first)
    }

    /// Drop a session; the last one marks the user offline.
    ///
    /// Returns true when no live session remains.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, user_id: Snowflake, session_id: &str) -> ServiceResult<bool> {
        let last = self.ctx.presence().unregister(user_id, session_id).await?;
        if last {
            info!(user_id = %user_id, "User went offline");
            self.announce(user_id, PresenceStatus::Offline).await;
        }
        Ok(last)
    }

    /// A heartbeat from a live session keeps its presence from lapsing
    pub async fn heartbeat(&self, user_id: Snowflake, session_id: &str) -> ServiceResult<()> {
        Ok(self.ctx.presence().refresh(user_id, session_id).await?)
    }

    /// Switch between online and away while connected
    #[instrument(skip(self))]
    pub async fn set_status(&self, user_id: Snowflake, status: PresenceStatus) -> ServiceResult<()> {
        if status == PresenceStatus::Offline {
            return Err(ServiceError::validation(
                "offline is derived from disconnects and cannot be set",
            ));
        }
        let current = self.ctx.presence().status(user_id).await?;
        if current == PresenceStatus::Offline {
            return Err(ServiceError::validation("user has no live session"));
        }
        if current == status {
            return Ok(());
        }
        self.ctx.presence().set_status(user_id, status).await?;
        self.announce(user_id, status).await;
        Ok(())
    }

    pub async fn status(&self, user_id: Snowflake) -> ServiceResult<PresenceStatus> {
        Ok(self.ctx.presence().status(user_id).await?)
    }

    async fn announce(&self, user_id: Snowflake, status: PresenceStatus) {
        let change = StatusChange {
            user_id,
            status,
            timestamp: self.ctx.now(),
        };
        events::broadcast(self.ctx, Some(user_id), ChatEventKind::UserStatusChange, &change).await;
    }
}
