//! # carechat-service
//!
//! Application layer: the messaging use cases, their DTOs, and the
//! [`ServiceContext`] that wires stores, presence and fan-out together.

pub mod dto;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use services::{
    ConversationService, DirectoryService, MessagingService, PresenceService, ServiceContext,
    ServiceContextBuilder, ServiceError, ServiceResult,
};
