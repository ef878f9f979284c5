//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while obtaining a credential
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable cached credential and interactive authorization is disabled
    #[error("Authorization required: no valid cached credential and interactive authorization is disabled")]
    AuthorizationRequired,

    /// Client secrets file needed for interactive authorization is absent
    #[error("Client secrets file not found: {0}")]
    ClientSecretsMissing(String),

    /// Client secrets file could not be parsed
    #[error("Invalid client secrets: {0}")]
    InvalidClientSecrets(String),

    /// OAuth2 authorization failed
    #[error("OAuth2 authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange or refresh failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Failed to start or read from the local callback server
    #[error("Failed to start callback server: {0}")]
    CallbackServerFailed(String),

    /// Token cache could not be written
    #[error("Token cache error: {0}")]
    CacheError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
