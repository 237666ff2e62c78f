//! Chat events - notifications fanned out to connected clients

mod chat_event;

pub use chat_event::{ChatEvent, ChatEventKind, UnknownEventKind};
