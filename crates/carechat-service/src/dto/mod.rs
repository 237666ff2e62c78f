//! Data transfer objects for API requests and responses
//!
//! This module provides:
//! - Request DTOs with validation for REST bodies and gateway event payloads
//! - Response DTOs serialized back to clients

pub mod requests;
pub mod responses;

pub use requests::{
    EditMessageRequest, HistoryQuery, ProvidersQuery, ReactionRequest, SearchQuery,
    SendMessageRequest, UpdateStatusRequest,
};

pub use responses::{
    ApiResponse, ConversationStats, ConversationSummary, DeletedMessage, HealthChecks,
    HealthResponse, HistoryPage, MessageResponse, MuteState, PinState, ReactionUpdate, ReadReceipt,
    ReadinessResponse, SentMessage, StatusUpdate, UnreadSummary, UserPresence, UserSearchResult, UserSummary,
};
