//! Error handling for the synchronization engine.
//!
//! The engine distinguishes transient failures (network, timeout, dropped
//! subscription, all worth retrying) from permanent ones (rejected send,
//! unknown conversation). Reconciliation itself never produces an error:
//! merge paths are total over their inputs, and malformed stream events are
//! dropped and logged rather than propagated.
//!
//! ## Patterns
//!
//! ```rust
//! use chatdesk_sync::SyncError;
//!
//! fn classify(err: &SyncError) -> &'static str {
//!     if err.is_recoverable() {
//!         "retry later"
//!     } else {
//!         "give up"
//!     }
//! }
//!
//! fn surface(err: &SyncError) -> String {
//!     // what the notice toast shows
//!     err.user_message()
//! }
//! ```

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing a conversation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network-level failure talking to the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The backend did not answer in time.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The backend rejected a send outright.
    #[error("send rejected: {0}")]
    SendRejected(String),

    /// The conversation does not exist on the backend.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// The operation needs a materialized conversation that is not loaded.
    #[error("conversation not materialized: {0}")]
    NotLoaded(String),

    /// The push channel could not be opened.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// A payload that could not be decoded.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether the operation might succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Timeout(_) | SyncError::Subscription(_)
        )
    }

    /// User-facing message for transient notices and error states.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Network(msg) => {
                format!("Network error: {}. Check your connection and retry.", msg)
            }
            SyncError::Timeout(msg) => {
                format!("Request timed out: {}. Retry in a moment.", msg)
            }
            SyncError::SendRejected(msg) => {
                format!("Message could not be sent: {}.", msg)
            }
            SyncError::ConversationNotFound(id) => {
                format!("Conversation '{}' no longer exists.", id)
            }
            SyncError::NotLoaded(id) => {
                format!("Conversation '{}' is not open.", id)
            }
            SyncError::Subscription(msg) => {
                format!("Live updates unavailable: {}. Reconnecting.", msg)
            }
            SyncError::Json(e) => {
                format!("Data format error: {}.", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SyncError::SendRejected("blocked contact".to_string());
        assert_eq!(error.to_string(), "send rejected: blocked contact");

        let error = SyncError::NotLoaded("conv-9".to_string());
        assert_eq!(error.to_string(), "conversation not materialized: conv-9");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(SyncError::Network("reset".into()).is_recoverable());
        assert!(SyncError::Timeout("send".into()).is_recoverable());
        assert!(SyncError::Subscription("ws closed".into()).is_recoverable());

        assert!(!SyncError::SendRejected("spam".into()).is_recoverable());
        assert!(!SyncError::ConversationNotFound("conv-1".into()).is_recoverable());
        assert!(!SyncError::NotLoaded("conv-1".into()).is_recoverable());
    }

    #[test]
    fn test_json_error_conversion() {
        let bad = r#"{"invalid json"#;
        let json_error = serde_json::from_str::<serde_json::Value>(bad).unwrap_err();
        let error: SyncError = json_error.into();
        assert!(matches!(error, SyncError::Json(_)));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        let message = SyncError::Network("connection reset".into()).user_message();
        assert!(message.contains("connection"));

        let message = SyncError::ConversationNotFound("conv-3".into()).user_message();
        assert!(message.contains("conv-3"));
    }
}
