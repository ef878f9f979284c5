use thiserror::Error;

#[derive(Debug, Error)]
pub enum GmailError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Gmail API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

pub type GmailResult<T> = Result<T, GmailError>;
