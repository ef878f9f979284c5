//! OAuth2 authorization code flow with PKCE and a loopback callback
//!
//! The operator visits the authorization URL in a browser; the provider then
//! redirects to `http://127.0.0.1:<port>/callback` where a one-shot listener
//! picks up the authorization code and exchanges it for tokens.

use crate::{AuthError, AuthResult, Credential};
use oauth2::{
    basic::{BasicClient, BasicTokenResponse},
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Path the provider redirects to after consent
const CALLBACK_PATH: &str = "/callback";

/// OAuth2 provider configuration
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret (installed apps still receive one from Google)
    pub client_secret: Option<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Required scopes
    pub scopes: Vec<String>,
    /// Local port for the OAuth2 callback, 0 picks a free port
    pub redirect_port: u16,
}

/// Client credentials as downloaded from the Google Cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    crate::google::AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    crate::google::TOKEN_URL.to_string()
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read a client secrets file
    pub fn load(path: &Path) -> AuthResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::ClientSecretsMissing(path.display().to_string()));
            }
            Err(e) => return Err(AuthError::IoError(e)),
        };
        Self::from_json(&content)
    }

    /// Parse the `{"installed": {...}}` or `{"web": {...}}` layout
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidClientSecrets(e.to_string()))?;

        let secrets = file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidClientSecrets("expected an \"installed\" or \"web\" section".to_string())
        })?;

        if secrets.client_id.is_empty() {
            return Err(AuthError::InvalidClientSecrets("empty client_id".to_string()));
        }
        Ok(secrets)
    }

    /// Build a flow configuration requesting the given scopes
    pub fn into_config(self, scopes: Vec<String>, redirect_port: u16) -> OAuth2Config {
        OAuth2Config {
            client_id: self.client_id,
            client_secret: self.client_secret,
            auth_url: self.auth_uri,
            token_url: self.token_uri,
            scopes,
            redirect_port,
        }
    }
}

/// Runs authorization and refresh requests against one provider
pub struct OAuth2Flow {
    config: OAuth2Config,
}

impl OAuth2Flow {
    /// Create a new OAuth2 flow
    pub fn new(config: OAuth2Config) -> Self {
        Self { config }
    }

    fn client(&self, redirect_url: Option<RedirectUrl>) -> AuthResult<BasicClient> {
        let client_id = ClientId::new(self.config.client_id.clone());
        let client_secret = self.config.client_secret.clone().map(ClientSecret::new);
        let auth_url = AuthUrl::new(self.config.auth_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(self.config.token_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(client_id, client_secret, auth_url, Some(token_url))
            .set_auth_type(AuthType::RequestBody);

        Ok(match redirect_url {
            Some(url) => client.set_redirect_uri(url),
            None => client,
        })
    }

    /// Run the interactive authorization flow
    ///
    /// Blocks until the operator completes consent in a browser.
    pub async fn authorize(&self) -> AuthResult<Credential> {
        let listener = TcpListener::bind(("127.0.0.1", self.config.redirect_port))
            .await
            .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))?
            .port();

        let redirect_url = RedirectUrl::new(format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH))
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid redirect URL: {}", e)))?;
        let client = self.client(Some(redirect_url))?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut auth_request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            // Google only issues a refresh token for offline access with fresh consent
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");
        for scope in &self.config.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token) = auth_request.url();

        info!("Listening for OAuth2 callback on port {}", port);
        info!("Open this URL to authorize mail sending: {}", auth_url);
        eprintln!("Please visit this URL to authorize this application: {}", auth_url);

        let code = wait_for_callback(&listener, csrf_token.secret()).await?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        info!("OAuth2 authorization completed");
        Ok(self.credential_from_response(&token_response, None))
    }

    /// Refresh an access token using a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<Credential> {
        let token_response = self
            .client(None)?
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        debug!("Refreshed OAuth2 access token");
        Ok(self.credential_from_response(&token_response, Some(refresh_token)))
    }

    fn credential_from_response(
        &self,
        response: &BasicTokenResponse,
        previous_refresh_token: Option<&str>,
    ) -> Credential {
        let expires_at = response
            .expires_in()
            .map(|duration| {
                let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
                chrono::Utc::now().timestamp().saturating_add(secs)
            });

        let scopes = match response.scopes() {
            Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
            None => self.config.scopes.clone(),
        };

        Credential {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| previous_refresh_token.map(str::to_string)),
            expires_at,
            scopes,
        }
    }
}

/// Accept connections until the provider hits the callback path
async fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> AuthResult<String> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))?;

        let request_line = {
            let mut reader = BufReader::new(&mut stream);
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .await
                .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))?;
            line
        };

        debug!("Received callback request: {}", request_line.trim());

        if !is_callback_request(&request_line) {
            send_http_response(&mut stream, "404 Not Found", "Not Found", "Nothing to see here.")
                .await;
            continue;
        }

        let (code, state) = match parse_callback_url(&request_line) {
            Ok(parsed) => parsed,
            Err(e) => {
                send_http_response(&mut stream, "400 Bad Request", "Error", &e.to_string()).await;
                return Err(e);
            }
        };

        if state != expected_state {
            send_http_response(&mut stream, "400 Bad Request", "Error", "Invalid state parameter")
                .await;
            return Err(AuthError::AuthorizationFailed(
                "CSRF token mismatch".to_string(),
            ));
        }

        send_http_response(
            &mut stream,
            "200 OK",
            "Success",
            "The authentication flow has completed. You may close this window.",
        )
        .await;
        return Ok(code);
    }
}

fn is_callback_request(request_line: &str) -> bool {
    request_line
        .split_whitespace()
        .nth(1)
        .is_some_and(|path| path == CALLBACK_PATH || path.starts_with("/callback?"))
}

/// Parse the authorization code and state from a callback request line
fn parse_callback_url(request_line: &str) -> AuthResult<(String, String)> {
    // Request line format: "GET /callback?code=xxx&state=yyy HTTP/1.1"
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(AuthError::AuthorizationFailed(
            "Invalid callback request".to_string(),
        ));
    }

    let path = parts[1];
    let url = url::Url::parse(&format!("http://localhost{}", path))
        .map_err(|e| AuthError::AuthorizationFailed(format!("Invalid callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => {
                let description = url
                    .query_pairs()
                    .find(|(k, _)| k == "error_description")
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_else(|| value.to_string());
                return Err(AuthError::AuthorizationFailed(description));
            }
            _ => {}
        }
    }

    match (code, state) {
        (Some(c), Some(s)) => Ok((c, s)),
        _ => Err(AuthError::AuthorizationFailed(
            "Missing code or state in callback".to_string(),
        )),
    }
}

/// Send a small HTML page back to the browser
async fn send_http_response(stream: &mut TcpStream, status: &str, title: &str, message: &str) {
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{} - mailrelay</title></head>
<body style="font-family: system-ui, sans-serif; text-align: center; padding: 2rem;">
    <h1>{}</h1>
    <p>{}</p>
</body>
</html>"#,
        title, title, message
    );

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!("Failed to answer OAuth2 callback: {}", e);
    }
    let _ = stream.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn bind_loopback() -> (TcpListener, u16) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    /// Issue a bare request line and return the raw HTTP response
    async fn browser_get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\n", path).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_listener_skips_other_paths_until_callback() {
        let (listener, port) = bind_loopback().await;
        let waiter = tokio::spawn(async move { wait_for_callback(&listener, "st4te").await });

        let response = browser_get(port, "/favicon.ico").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
        assert!(!waiter.is_finished());

        let response = browser_get(port, "/callback?code=4%2F0Ab&state=st4te").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let code = waiter.await.unwrap().unwrap();
        assert_eq!(code, "4/0Ab");
    }

    #[tokio::test]
    async fn test_listener_rejects_state_mismatch() {
        let (listener, port) = bind_loopback().await;
        let waiter = tokio::spawn(async move { wait_for_callback(&listener, "st4te").await });

        let response = browser_get(port, "/callback?code=abc&state=forged").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(ref m) if m == "CSRF token mismatch"));
    }

    #[tokio::test]
    async fn test_listener_reports_provider_denial() {
        let (listener, port) = bind_loopback().await;
        let waiter = tokio::spawn(async move { wait_for_callback(&listener, "st4te").await });

        let response = browser_get(port, "/callback?error=access_denied&state=st4te").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(ref m) if m == "access_denied"));
    }

    #[test]
    fn test_huge_expires_in_saturates() {
        use oauth2::basic::BasicTokenType;
        use oauth2::{AccessToken, EmptyExtraTokenFields, StandardTokenResponse};
        use std::time::Duration;

        let flow = OAuth2Flow::new(
            ClientSecrets::from_json(r#"{"installed": {"client_id": "id"}}"#)
                .unwrap()
                .into_config(vec!["scope-a".to_string()], 0),
        );
        let mut response = StandardTokenResponse::new(
            AccessToken::new("ya29.new".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        response.set_expires_in(Some(&Duration::from_secs(u64::MAX)));

        let credential = flow.credential_from_response(&response, Some("1//old"));
        assert_eq!(credential.expires_at, Some(i64::MAX));
        assert_eq!(credential.refresh_token.as_deref(), Some("1//old"));
        assert_eq!(credential.scopes, vec!["scope-a".to_string()]);
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_parse_callback_url() {
        let (code, state) =
            parse_callback_url("GET /callback?code=4%2F0Ab&state=xyz&scope=mail HTTP/1.1\r\n")
                .unwrap();
        assert_eq!(code, "4/0Ab");
        assert_eq!(state, "xyz");
    }

    #[test]
    fn test_parse_callback_url_reports_provider_error() {
        let err = parse_callback_url(
            "GET /callback?error=access_denied&error_description=User+denied HTTP/1.1",
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(ref m) if m == "User denied"));

        let err = parse_callback_url("GET /callback?error=access_denied HTTP/1.1").unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationFailed(ref m) if m == "access_denied"));
    }

    #[test]
    fn test_parse_callback_url_requires_code_and_state() {
        assert!(parse_callback_url("GET /callback?code=abc HTTP/1.1").is_err());
        assert!(parse_callback_url("garbage").is_err());
    }

    #[test]
    fn test_is_callback_request() {
        assert!(is_callback_request("GET /callback?code=a&state=b HTTP/1.1"));
        assert!(!is_callback_request("GET /favicon.ico HTTP/1.1"));
        assert!(!is_callback_request("GET /callbackx HTTP/1.1"));
    }

    #[test]
    fn test_client_secrets_installed_layout() {
        let secrets = ClientSecrets::from_json(
            r#"{"installed": {
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "shh",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret.as_deref(), Some("shh"));

        let config = secrets.into_config(vec!["scope-a".to_string()], 0);
        assert_eq!(config.token_url, "https://oauth2.googleapis.com/token");
        assert_eq!(config.scopes, vec!["scope-a".to_string()]);
    }

    #[test]
    fn test_client_secrets_web_layout_uses_default_endpoints() {
        let secrets = ClientSecrets::from_json(r#"{"web": {"client_id": "abc"}}"#).unwrap();
        assert_eq!(secrets.auth_uri, crate::google::AUTH_URL);
        assert_eq!(secrets.token_uri, crate::google::TOKEN_URL);
        assert!(secrets.client_secret.is_none());
    }

    #[test]
    fn test_client_secrets_rejects_unknown_layout() {
        assert!(matches!(
            ClientSecrets::from_json(r#"{"other": {}}"#),
            Err(AuthError::InvalidClientSecrets(_))
        ));
        assert!(matches!(
            ClientSecrets::from_json("not json"),
            Err(AuthError::InvalidClientSecrets(_))
        ));
    }

    #[test]
    fn test_missing_client_secrets_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientSecrets::load(&dir.path().join("credentials.json")).unwrap_err();
        assert!(matches!(err, AuthError::ClientSecretsMissing(_)));
    }
}
