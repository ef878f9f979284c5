//! Outgoing message construction and transport encoding

use crate::{GmailError, GmailResult, RawMessage};
use base64::Engine;
use lettre::message::{
    header::{ContentType, HeaderName, HeaderValue, Headers, Subject, To, MIME_VERSION_1_0},
    Mailboxes, SinglePart,
};

/// Sender the Gmail API resolves to the authenticated account
pub const AUTHENTICATED_SENDER: &str = "me";

/// Content type of the message body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Text,
    Html,
}

impl BodyKind {
    pub fn from_is_html(is_html: bool) -> Self {
        if is_html {
            BodyKind::Html
        } else {
            BodyKind::Text
        }
    }

    fn content_type(self) -> ContentType {
        match self {
            BodyKind::Text => ContentType::TEXT_PLAIN,
            BodyKind::Html => ContentType::TEXT_HTML,
        }
    }
}

/// Email message to send
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// From header value, `me` unless overridden
    pub from: String,
    /// Recipient address list
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Body content
    pub body: String,
    /// Whether the body is plain text or HTML
    pub kind: BodyKind,
}

impl OutgoingMessage {
    /// Create a plain text message from the authenticated account
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: AUTHENTICATED_SENDER.to_string(),
            to: to.into(),
            subject: subject.into(),
            body: String::new(),
            kind: BodyKind::Text,
        }
    }

    /// Set a plain text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.kind = BodyKind::Text;
        self
    }

    /// Set an HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.kind = BodyKind::Html;
        self
    }

    /// Serialize to an RFC 2822 message
    ///
    /// The From header is written verbatim because `me` is not a mailbox
    /// address and only means something to the Gmail API.
    pub fn to_mime(&self) -> GmailResult<Vec<u8>> {
        let recipients: Mailboxes = self
            .to
            .parse()
            .map_err(|e| GmailError::InvalidAddress(format!("{}: {}", self.to, e)))?;
        if recipients.iter().next().is_none() {
            return Err(GmailError::InvalidAddress("no recipient".to_string()));
        }

        let mut headers = Headers::new();
        headers.set(MIME_VERSION_1_0);
        headers.set(To::from(recipients));
        headers.insert_raw(HeaderValue::new(
            HeaderName::new_from_ascii_str("From"),
            self.from.clone(),
        ));
        headers.set(Subject::from(self.subject.clone()));

        let body = SinglePart::builder()
            .header(self.kind.content_type())
            .body(self.body.clone());

        let mut mime = headers.to_string().into_bytes();
        mime.extend_from_slice(&body.formatted());
        Ok(mime)
    }

    /// Encode as the `raw` payload expected by `users.messages.send`
    pub fn to_raw(&self) -> GmailResult<RawMessage> {
        let mime = self.to_mime()?;
        Ok(RawMessage {
            raw: base64::engine::general_purpose::URL_SAFE.encode(mime),
        })
    }
}
