//! Domain errors - error types for the messaging domain

use thiserror::Error;

use crate::value_objects::{AccountId, ChannelId, DeleteRequestId};

/// Domain layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("Delete request not found: {0}")]
    DeleteRequestNotFound(DeleteRequestId),

    #[error("Account {account_id} is not a member of channel {channel_id}")]
    NotAMember {
        channel_id: ChannelId,
        account_id: AccountId,
    },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Malformed system message: {0}")]
    MalformedMessage(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Account {account_id} has no vote on this delete request")]
    NotEligibleVoter { account_id: AccountId },

    #[error("Only the member who blocked the channel can unblock it")]
    NotBlocker,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Channel {0} already has a pending delete request")]
    DeleteRequestExists(ChannelId),

    #[error("A message handler is already registered for this connection")]
    HandlerAlreadyRegistered,

    // =========================================================================
    // Business Rule Violations
    // =========================================================================
    #[error("Delete request {0} is already resolved")]
    StaleVote(DeleteRequestId),

    #[error("Channel {0} is blocked")]
    ChannelBlocked(ChannelId),

    #[error("Channel {0} does not support blocking")]
    BlockingUnsupported(ChannelId),

    #[error("Channel {0} has no other member eligible to vote on deletion")]
    NoEligibleVoters(ChannelId),

    #[error("Channel {0} is closed")]
    ChannelClosed(ChannelId),

    #[error("Channel {0} is still loading")]
    ChannelLoading(ChannelId),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::ChannelNotFound(_) => "UNKNOWN_CHANNEL",
            Self::DeleteRequestNotFound(_) => "UNKNOWN_DELETE_REQUEST",
            Self::NotAMember { .. } => "NOT_A_MEMBER",

            // Validation
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidChannel(_) => "INVALID_CHANNEL",
            Self::MalformedMessage(_) => "MALFORMED_MESSAGE",

            // Authorization
            Self::NotEligibleVoter { .. } => "NOT_ELIGIBLE_VOTER",
            Self::NotBlocker => "NOT_BLOCKER",

            // Conflict
            Self::DeleteRequestExists(_) => "DELETE_REQUEST_EXISTS",
            Self::HandlerAlreadyRegistered => "HANDLER_ALREADY_REGISTERED",

            // Business Rules
            Self::StaleVote(_) => "STALE_VOTE",
            Self::ChannelBlocked(_) => "CHANNEL_BLOCKED",
            Self::BlockingUnsupported(_) => "BLOCKING_UNSUPPORTED",
            Self::NoEligibleVoters(_) => "NO_ELIGIBLE_VOTERS",
            Self::ChannelClosed(_) => "CHANNEL_CLOSED",
            Self::ChannelLoading(_) => "CHANNEL_LOADING",

            // Infrastructure
            Self::ConnectionError(_) => "CONNECTION_ERROR",
            Self::FetchError(_) => "FETCH_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChannelNotFound(_) | Self::DeleteRequestNotFound(_) | Self::NotAMember { .. }
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::InvalidChannel(_)
                | Self::MalformedMessage(_)
                | Self::NoEligibleVoters(_)
        )
    }

    /// Check if this is an authorization error
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::NotEligibleVoter { .. } | Self::NotBlocker)
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DeleteRequestExists(_)
                | Self::HandlerAlreadyRegistered
                | Self::ChannelLoading(_)
        )
    }

    /// Check if this error refers to state that has already moved on
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleVote(_) | Self::ChannelClosed(_))
    }

    /// Connection- and fetch-level failures are the only ones shown as banners
    pub fn is_banner(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::FetchError(_))
    }

    /// Rebuild a domain error from its wire code, used by remote API clients
    pub fn from_code(code: &str, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        Some(match code {
            "VALIDATION_ERROR" => Self::ValidationError(message),
            "INVALID_CHANNEL" => Self::InvalidChannel(message),
            "MALFORMED_MESSAGE" => Self::MalformedMessage(message),
            "NOT_BLOCKER" => Self::NotBlocker,
            "CONNECTION_ERROR" => Self::ConnectionError(message),
            "FETCH_ERROR" => Self::FetchError(message),
            "INTERNAL_ERROR" => Self::InternalError(message),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DomainError::StaleVote(DeleteRequestId::new(1));
        assert_eq!(err.code(), "STALE_VOTE");

        let err = DomainError::DeleteRequestExists(ChannelId::new(4));
        assert_eq!(err.code(), "DELETE_REQUEST_EXISTS");
    }

    #[test]
    fn test_classification() {
        assert!(DomainError::ChannelNotFound(ChannelId::new(1)).is_not_found());
        assert!(DomainError::DeleteRequestExists(ChannelId::new(1)).is_conflict());
        assert!(DomainError::StaleVote(DeleteRequestId::new(1)).is_stale());
        assert!(DomainError::NotEligibleVoter {
            account_id: AccountId::new(3)
        }
        .is_authorization());
        assert!(DomainError::MalformedMessage("x".to_string()).is_validation());
        assert!(DomainError::FetchError("timeout".to_string()).is_banner());
        assert!(!DomainError::MalformedMessage("x".to_string()).is_banner());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::ChannelNotFound(ChannelId::new(123));
        assert_eq!(err.to_string(), "Channel not found: 123");

        let err = DomainError::NotAMember {
            channel_id: ChannelId::new(2),
            account_id: AccountId::new(9),
        };
        assert_eq!(err.to_string(), "Account 9 is not a member of channel 2");
    }

    #[test]
    fn test_from_code() {
        assert_eq!(
            DomainError::from_code("NOT_BLOCKER", ""),
            Some(DomainError::NotBlocker)
        );
        assert_eq!(DomainError::from_code("STALE_VOTE", ""), None);
    }
}
