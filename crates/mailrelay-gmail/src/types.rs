use serde::{Deserialize, Serialize};

/// Request body for `users.messages.send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// URL-safe base64 encoding of the full RFC 2822 message
    pub raw: String,
}

/// Message resource returned after a successful send
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub id: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    #[serde(rename = "labelIds", default)]
    pub label_ids: Vec<String>,
}
