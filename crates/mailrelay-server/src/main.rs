//! mailrelay - relays JSON requests as Gmail messages
//!
//! Run `mailrelay authorize` once to complete the OAuth consent flow and seed
//! the token cache, then `mailrelay` to serve the API.

use anyhow::Result;
use mailrelay_auth::CredentialManager;
use mailrelay_core::Dispatcher;
use mailrelay_gmail::GmailClient;
use mailrelay_server::{templates::Templates, AppState, Config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,mailrelay=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let config = Config::from_env()?;
    let credentials = Arc::new(CredentialManager::new(config.credential_manager_config()));

    if std::env::args().nth(1).as_deref() == Some("authorize") {
        let credential = credentials.obtain_credential().await?;
        info!(
            "Credential ready in {} (expires_at={:?})",
            credentials.cache().path().display(),
            credential.expires_at
        );
        return Ok(());
    }

    let templates = Templates::load()?;
    let transport = Arc::new(GmailClient::with_base_url(config.gmail_api_base.clone()));
    let dispatcher = Dispatcher::new(credentials, transport);
    let state = Arc::new(AppState::new(dispatcher, templates, config.brand.clone()));

    let app = mailrelay_server::router(state);

    info!("Starting mailrelay on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
