//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Lookup
    // =========================================================================
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    // =========================================================================
    // Authorization / business rules
    // =========================================================================
    /// Actor is not the sender or not a participant
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Message can only be edited within {minutes} minutes")]
    EditWindowExpired { minutes: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    // =========================================================================
    // Infrastructure (wrapped)
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::EditWindowExpired { .. } => "EDIT_WINDOW_EXPIRED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Forbidden and expired-window errors both deny the actor
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::EditWindowExpired { .. })
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Cache(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DomainError::not_found("Message", 1).code(), "NOT_FOUND");
        assert_eq!(
            DomainError::EditWindowExpired { minutes: 15 }.code(),
            "EDIT_WINDOW_EXPIRED"
        );
        assert_eq!(DomainError::Storage("down".into()).code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_classification() {
        assert!(DomainError::not_found("User", 9).is_not_found());
        assert!(DomainError::forbidden("not the sender").is_authorization());
        assert!(DomainError::EditWindowExpired { minutes: 15 }.is_authorization());
        assert!(DomainError::validation("empty").is_validation());
        assert!(DomainError::Cache("x".into()).is_infrastructure());
        assert!(!DomainError::validation("empty").is_authorization());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::not_found("Conversation", 123);
        assert_eq!(err.to_string(), "Conversation not found: 123");

        let err = DomainError::EditWindowExpired { minutes: 15 };
        assert_eq!(
            err.to_string(),
            "Message can only be edited within 15 minutes"
        );
    }
}
