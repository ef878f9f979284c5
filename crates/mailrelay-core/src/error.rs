//! Error types for message dispatch

use thiserror::Error;

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while dispatching a message
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Required input was missing or empty
    #[error("{0}")]
    Validation(String),

    /// No valid credential could be obtained
    #[error("Authentication error: {0}")]
    Credential(#[from] mailrelay_auth::AuthError),

    /// Message construction or remote submission failed
    #[error("Send error: {0}")]
    Send(#[from] mailrelay_gmail::GmailError),
}

impl DispatchError {
    /// Whether the caller is at fault rather than the service
    pub fn is_validation(&self) -> bool {
        matches!(self, DispatchError::Validation(_))
    }
}
