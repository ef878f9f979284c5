//! Application state shared by all handlers

use crate::templates::Templates;
use mailrelay_core::Dispatcher;

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub templates: Templates,
    /// Name shown in email headers and footers
    pub brand: String,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, templates: Templates, brand: impl Into<String>) -> Self {
        Self {
            dispatcher,
            templates,
            brand: brand.into(),
        }
    }
}
