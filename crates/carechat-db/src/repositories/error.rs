//! Error handling utilities for repositories

use carechat_core::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::Storage(e.to_string())
}

/// Check for a foreign key violation and return the caller's error or fall back
pub fn map_foreign_key_violation<F>(e: SqlxError, on_violation: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return on_violation();
        }
    }
    map_db_error(e)
}

pub fn conversation_not_found(id: impl ToString) -> DomainError {
    DomainError::not_found("Conversation", id)
}

pub fn message_not_found(id: impl ToString) -> DomainError {
    DomainError::not_found("Message", id)
}
