//! Server configuration from environment variables

use mailrelay_auth::{google, CredentialManagerConfig};
use mailrelay_gmail::GMAIL_API_BASE;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_TOKEN_CACHE: &str = "confidencial/token.json";
pub const DEFAULT_CLIENT_SECRETS: &str = "confidencial/credentials.json";
pub const DEFAULT_BRAND: &str = "Travel Agency";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var} ({value:?}): {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// Token cache file
    pub token_cache: PathBuf,
    /// OAuth client secrets file
    pub client_secrets: PathBuf,
    /// Scopes requested during authorization
    pub scopes: Vec<String>,
    /// Whether a missing credential may trigger the browser consent flow
    pub interactive_auth: bool,
    /// Loopback port for the consent callback, 0 picks a free port
    pub redirect_port: u16,
    /// Gmail API origin
    pub gmail_api_base: String,
    /// Name shown in email headers and footers
    pub brand: String,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_raw = get("MAILRELAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: "MAILRELAY_BIND",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let scopes = match get("MAILRELAY_SCOPES") {
            Some(raw) => {
                let scopes: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if scopes.is_empty() {
                    return Err(ConfigError::Invalid {
                        var: "MAILRELAY_SCOPES",
                        value: raw,
                        reason: "no scopes listed".to_string(),
                    });
                }
                scopes
            }
            None => vec![google::GMAIL_SEND_SCOPE.to_string()],
        };

        let interactive_auth = match get("MAILRELAY_INTERACTIVE_AUTH") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "MAILRELAY_INTERACTIVE_AUTH",
                value: raw.clone(),
                reason: "expected true or false".to_string(),
            })?,
            None => true,
        };

        let redirect_port = match get("MAILRELAY_OAUTH_REDIRECT_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "MAILRELAY_OAUTH_REDIRECT_PORT",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => 0,
        };

        Ok(Self {
            bind_addr,
            token_cache: get("MAILRELAY_TOKEN_CACHE")
                .unwrap_or_else(|| DEFAULT_TOKEN_CACHE.to_string())
                .into(),
            client_secrets: get("MAILRELAY_CLIENT_SECRETS")
                .unwrap_or_else(|| DEFAULT_CLIENT_SECRETS.to_string())
                .into(),
            scopes,
            interactive_auth,
            redirect_port,
            gmail_api_base: get("MAILRELAY_GMAIL_API_BASE")
                .unwrap_or_else(|| GMAIL_API_BASE.to_string()),
            brand: get("MAILRELAY_BRAND").unwrap_or_else(|| DEFAULT_BRAND.to_string()),
        })
    }

    /// Settings for the credential manager
    pub fn credential_manager_config(&self) -> CredentialManagerConfig {
        CredentialManagerConfig {
            cache_path: self.token_cache.clone(),
            client_secrets_path: self.client_secrets.clone(),
            scopes: self.scopes.clone(),
            interactive: self.interactive_auth,
            redirect_port: self.redirect_port,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
