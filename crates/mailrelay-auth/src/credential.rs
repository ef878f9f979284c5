//! The OAuth2 credential handed out by the credential manager

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds of remaining lifetime below which a token counts as expired
const EXPIRY_SKEW_SECS: i64 = 300;

/// OAuth2 token set authorizing mail API calls on behalf of one user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API calls
    pub access_token: String,
    /// Refresh token for obtaining new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token expiration timestamp (Unix seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Scopes granted with the token
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Check if the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let now = chrono::Utc::now().timestamp();
                expires_at.saturating_sub(now) < EXPIRY_SKEW_SECS
            }
            None => false,
        }
    }

    /// A credential is usable when it carries an access token that has not expired
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Only an expired credential holding a refresh token can be refreshed in place
    pub fn can_refresh(&self) -> bool {
        self.is_expired()
            && self
                .refresh_token
                .as_deref()
                .is_some_and(|token| !token.is_empty())
    }
}

/// Mask a secret for display: first 4 characters followed by `***`
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(4) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(mask_token))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}
