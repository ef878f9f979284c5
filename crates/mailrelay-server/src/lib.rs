//! mailrelay HTTP API
//!
//! Provides REST endpoints for:
//! - Relaying a caller-written email
//! - Sending the login security alert

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod templates;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/send-email", post(handlers::send_email))
        .route(
            "/api/v1/login-notification",
            post(handlers::login_notification),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
