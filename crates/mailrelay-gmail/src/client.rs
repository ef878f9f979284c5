use crate::error::{GmailError, GmailResult};
use crate::types::*;
use async_trait::async_trait;
use tracing::{debug, info};

/// Default Gmail API origin
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

/// Submits encoded messages on behalf of a user
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send an already encoded message, returning the provider's message resource
    async fn send_raw(
        &self,
        access_token: &str,
        user_id: &str,
        message: &RawMessage,
    ) -> GmailResult<SentMessage>;
}

pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
}

impl GmailClient {
    pub fn new() -> Self {
        Self::with_base_url(GMAIL_API_BASE)
    }

    /// Point the client at another API origin
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn send_url(&self, user_id: &str) -> String {
        format!("{}/gmail/v1/users/{}/messages/send", self.base_url, user_id)
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for GmailClient {
    async fn send_raw(
        &self,
        access_token: &str,
        user_id: &str,
        message: &RawMessage,
    ) -> GmailResult<SentMessage> {
        let url = self.send_url(user_id);
        debug!("Gmail: sending message, raw length={}", message.raw.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GmailError::ApiError { status, body });
        }

        let sent: SentMessage = response
            .json()
            .await
            .map_err(|e| GmailError::ParseError(e.to_string()))?;

        info!("Gmail: sent message, id={}", sent.id);
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn payload() -> RawMessage {
        RawMessage {
            raw: "VG86IGFAZXhhbXBsZS5jb20NCg==".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_raw_posts_payload_with_bearer_token() {
        let app = Router::new().route(
            "/gmail/v1/users/:user/messages/send",
            post(
                |Path(user): Path<String>, headers: HeaderMap, Json(body): Json<RawMessage>| async move {
                    assert_eq!(user, "me");
                    assert_eq!(
                        headers.get("authorization").unwrap().to_str().unwrap(),
                        "Bearer ya29.token"
                    );
                    assert_eq!(body, payload());
                    Json(serde_json::json!({
                        "id": "18c2f0a1b2c3d4e5",
                        "threadId": "18c2f0a1b2c3d4e5",
                        "labelIds": ["SENT"],
                    }))
                },
            ),
        );
        let base = spawn(app).await;

        let sent = GmailClient::with_base_url(format!("{}/", base))
            .send_raw("ya29.token", "me", &payload())
            .await
            .unwrap();

        assert_eq!(sent.id, "18c2f0a1b2c3d4e5");
        assert_eq!(sent.thread_id.as_deref(), Some("18c2f0a1b2c3d4e5"));
        assert_eq!(sent.label_ids, vec!["SENT".to_string()]);
    }

    #[tokio::test]
    async fn test_send_raw_surfaces_api_errors() {
        let app = Router::new().route(
            "/gmail/v1/users/:user/messages/send",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#,
                )
            }),
        );
        let base = spawn(app).await;

        let err = GmailClient::with_base_url(base)
            .send_raw("ya29.bad", "me", &payload())
            .await
            .unwrap_err();

        match err {
            GmailError::ApiError { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid Credentials"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_send_raw_rejects_unexpected_response_body() {
        let app = Router::new().route(
            "/gmail/v1/users/:user/messages/send",
            post(|| async { Json(serde_json::json!({ "unexpected": true })) }),
        );
        let base = spawn(app).await;

        let err = GmailClient::with_base_url(base)
            .send_raw("ya29.token", "me", &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, GmailError::ParseError(_)));
    }
}
