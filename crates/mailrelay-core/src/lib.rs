//! Core dispatch logic for mailrelay
//!
//! Ties the credential lifecycle and the Gmail transport together.

mod dispatcher;
mod error;

pub use dispatcher::{require_fields, Dispatcher, SendResult};
pub use error::{DispatchError, DispatchResult};
