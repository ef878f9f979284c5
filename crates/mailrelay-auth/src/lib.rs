//! Credential lifecycle for mailrelay
//!
//! Hands out a valid OAuth2 credential on demand:
//! 1. A cached credential from the token cache file, if still valid
//! 2. A refreshed credential, if the cached one expired and has a refresh token
//! 3. A freshly authorized credential from the interactive loopback flow
//!
//! Whatever changed is written back to the cache before it is returned.

mod cache;
mod credential;
mod error;
mod flow;

pub use cache::TokenCache;
pub use credential::{mask_token, Credential};
pub use error::{AuthError, AuthResult};
pub use flow::{ClientSecrets, OAuth2Config, OAuth2Flow};

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Google OAuth2 endpoints and scopes
pub mod google {
    /// Authorization endpoint
    pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

    /// Token endpoint
    pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

    /// Scope allowing messages to be sent, nothing else
    pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
}

/// Anything that can produce a credential valid for the current request
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn obtain_credential(&self) -> AuthResult<Credential>;
}

/// Settings for the credential manager
#[derive(Debug, Clone)]
pub struct CredentialManagerConfig {
    /// Token cache file
    pub cache_path: PathBuf,
    /// Client secrets file (read-only)
    pub client_secrets_path: PathBuf,
    /// Scopes requested during authorization
    pub scopes: Vec<String>,
    /// Whether the interactive browser flow may run
    pub interactive: bool,
    /// Loopback port for the authorization callback, 0 picks a free port
    pub redirect_port: u16,
}

/// Owns the cached credential and keeps it usable
pub struct CredentialManager {
    config: CredentialManagerConfig,
    cache: TokenCache,
    // Serializes refresh and authorization so only one runs at a time
    lock: Mutex<()>,
}

impl CredentialManager {
    /// Create a new credential manager
    pub fn new(config: CredentialManagerConfig) -> Self {
        let cache = TokenCache::new(config.cache_path.clone());
        Self {
            config,
            cache,
            lock: Mutex::new(()),
        }
    }

    /// The token cache backing this manager
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Return a valid credential, refreshing or authorizing as needed
    pub async fn obtain_credential(&self) -> AuthResult<Credential> {
        let _guard = self.lock.lock().await;

        let cached = self.cache.load();
        if let Some(credential) = cached.as_ref().filter(|c| c.is_valid()) {
            debug!("Using cached credential");
            return Ok(credential.clone());
        }

        let credential = match cached {
            Some(expired) if expired.can_refresh() => {
                info!("Cached credential expired, refreshing");
                let refresh_token = expired.refresh_token.as_deref().unwrap_or_default();
                self.flow()?.refresh(refresh_token).await?
            }
            _ => {
                if !self.config.interactive {
                    return Err(AuthError::AuthorizationRequired);
                }
                info!("No usable cached credential, starting interactive authorization");
                self.flow()?.authorize().await?
            }
        };

        self.cache.store(&credential)?;
        Ok(credential)
    }

    fn flow(&self) -> AuthResult<OAuth2Flow> {
        let secrets = ClientSecrets::load(&self.config.client_secrets_path)?;
        Ok(OAuth2Flow::new(secrets.into_config(
            self.config.scopes.clone(),
            self.config.redirect_port,
        )))
    }
}

#[async_trait]
impl CredentialSource for CredentialManager {
    async fn obtain_credential(&self) -> AuthResult<Credential> {
        CredentialManager::obtain_credential(self).await
    }
}
