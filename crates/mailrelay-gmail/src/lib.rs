//! Gmail sending for mailrelay
//!
//! Builds RFC 2822 messages, encodes them into the `raw` transport payload
//! and submits them through `users.messages.send`.

pub mod client;
pub mod error;
pub mod message;
pub mod types;

pub use client::{GmailClient, MailTransport, GMAIL_API_BASE};
pub use error::{GmailError, GmailResult};
pub use message::{BodyKind, OutgoingMessage, AUTHENTICATED_SENDER};
pub use types::*;
