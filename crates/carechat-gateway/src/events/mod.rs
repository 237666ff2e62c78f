//! Client-to-server events

mod client;

pub use client::{
    CallSignal, CallSignalKind, ClientEvent, ConversationRef, EditPayload, MessageRef,
    ReactionPayload, ReadTarget,
};
