//! HTTP handlers for the mail relay API

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use mailrelay_core::require_fields;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::templates::{submission_timestamp, BrandedMessage, LoginNotification};

/// Subject of every login alert
pub const LOGIN_ALERT_SUBJECT: &str = "🔔 Nuevo inicio de sesión detectado";

/// Shown when the caller does not know the client IP
pub const UNKNOWN_IP: &str = "Desconocida";

/// Shown when the caller does not know the browser
pub const UNKNOWN_BROWSER: &str = "Desconocido";

const SUCCESS: &str = "success";

#[derive(Debug, Default, Deserialize)]
pub struct SendEmailRequest {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    /// Accepted in place of `message`
    pub body: Option<String>,
    /// Wrap the text in the branded HTML template
    #[serde(default)]
    pub html: bool,
}

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub status: &'static str,
    pub message_id: String,
    pub to: String,
    pub subject: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginNotificationRequest {
    pub to: Option<String>,
    pub name: Option<String>,
    pub ip: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginNotificationResponse {
    pub status: &'static str,
    pub message_id: String,
    pub to: String,
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Relay a caller-written email
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<Json<SendEmailResponse>, ApiError> {
    let Json(req) = payload?;

    let to = req.to.unwrap_or_default();
    let subject = req.subject.unwrap_or_default();
    let text = req
        .message
        .filter(|m| !m.trim().is_empty())
        .or(req.body)
        .unwrap_or_default();

    require_fields(&[
        ("to", to.as_str()),
        ("subject", subject.as_str()),
        ("message", text.as_str()),
    ])?;

    let result = if req.html {
        let html = state.templates.render_branded_message(&BrandedMessage {
            subject: &subject,
            body: &text,
            timestamp: &submission_timestamp(),
            brand: &state.brand,
        })?;
        state.dispatcher.send(&to, &subject, &html, true).await?
    } else {
        state.dispatcher.send(&to, &subject, &text, false).await?
    };

    info!("Relayed email {} to {}", result.message_id, result.to);

    Ok(Json(SendEmailResponse {
        status: SUCCESS,
        message_id: result.message_id,
        to: result.to,
        subject: result.subject,
    }))
}

/// Send the security alert for a new sign-in
pub async fn login_notification(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginNotificationRequest>, JsonRejection>,
) -> Result<Json<LoginNotificationResponse>, ApiError> {
    let Json(req) = payload?;

    let to = req.to.unwrap_or_default();
    let name = req.name.unwrap_or_default();
    require_fields(&[("to", to.as_str()), ("name", name.as_str())])?;

    let ip = or_default(req.ip, UNKNOWN_IP);
    let browser = or_default(req.browser, UNKNOWN_BROWSER);

    let html = state
        .templates
        .render_login_notification(&LoginNotification {
            name: &name,
            timestamp: &submission_timestamp(),
            ip: &ip,
            browser: &browser,
            brand: &state.brand,
        })?;

    let result = state
        .dispatcher
        .send(&to, LOGIN_ALERT_SUBJECT, &html, true)
        .await?;

    info!("Sent login notification {} to {}", result.message_id, result.to);

    Ok(Json(LoginNotificationResponse {
        status: SUCCESS,
        message_id: result.message_id,
        to: result.to,
    }))
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
