//! Fan-out helpers shared by the services
//!
//! Emission happens after persistence has succeeded, so a payload that fails
//! to serialize is logged and dropped instead of failing the operation.

use carechat_core::{ChatEvent, ChatEventKind, Snowflake};
use serde::Serialize;
use tracing::warn;

use super::context::ServiceContext;

fn build<T: Serialize + ?Sized>(kind: ChatEventKind, payload: &T) -> Option<ChatEvent> {
    match serde_json::to_value(payload) {
        Ok(value) => Some(ChatEvent::new(kind, value)),
        Err(e) => {
            warn!(event = %kind, error = %e, "Failed to serialize event payload");
            None
        }
    }
}

pub(crate) async fn notify<T: Serialize + ?Sized>(
    ctx: &ServiceContext,
    recipients: &[Snowflake],
    kind: ChatEventKind,
    payload: &T,
) {
    if let Some(event) = build(kind, payload) {
        ctx.notifier().notify(recipients, event).await;
    }
}

pub(crate) async fn broadcast<T: Serialize + ?Sized>(
    ctx: &ServiceContext,
    except: Option<Snowflake>,
    kind: ChatEventKind,
    payload: &T,
) {
    if let Some(event) = build(kind, payload) {
        ctx.notifier().broadcast(event, except).await;
    }
}
