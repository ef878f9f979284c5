//! Message dispatcher
//!
//! Every send obtains a credential for that request, encodes the message and
//! submits it once. Nothing is queued or retried.

use crate::{DispatchError, DispatchResult};
use mailrelay_auth::CredentialSource;
use mailrelay_gmail::{MailTransport, OutgoingMessage, AUTHENTICATED_SENDER};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    /// Provider-assigned message id
    pub message_id: String,
    pub to: String,
    pub subject: String,
}

/// Check that every named field is present and non-blank
///
/// The error lists all missing fields, not just the first.
pub fn require_fields(fields: &[(&str, &str)]) -> DispatchResult<()> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("'{}'", name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::Validation(format!(
            "Missing fields: {}",
            missing.join(", ")
        )))
    }
}

/// Builds and submits messages using credentials from a `CredentialSource`
#[derive(Clone)]
pub struct Dispatcher {
    credentials: Arc<dyn CredentialSource>,
    transport: Arc<dyn MailTransport>,
}

impl Dispatcher {
    pub fn new(credentials: Arc<dyn CredentialSource>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    /// Send one message from the authenticated account
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> DispatchResult<SendResult> {
        require_fields(&[("to", to), ("subject", subject), ("body", body)])?;

        let credential = self.credentials.obtain_credential().await.map_err(|e| {
            warn!("Could not obtain credential: {}", e);
            DispatchError::from(e)
        })?;

        let message = OutgoingMessage::new(to, subject);
        let message = if is_html {
            message.html(body)
        } else {
            message.text(body)
        };
        let payload = message.to_raw()?;
        debug!("Encoded message for {} ({} bytes raw)", to, payload.raw.len());

        let sent = self
            .transport
            .send_raw(&credential.access_token, AUTHENTICATED_SENDER, &payload)
            .await?;

        info!("Sent message {} to {}", sent.id, to);
        Ok(SendResult {
            message_id: sent.id,
            to: to.to_string(),
            subject: subject.to_string(),
        })
    }
}
