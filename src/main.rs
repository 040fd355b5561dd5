//! cleanpay-bridge - CleanPay laundry room bridge
//!
//! Polls the CleanPay API for washer and dryer status and exposes every
//! machine as status and time-left sensors over a small JSON API.

mod api;
mod cleanpay;
mod config;
mod entry_id;
mod error;
mod models;
mod sensor;

use std::net::SocketAddr;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::cleanpay::{CleanPayClient, EntryManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cleanpay_bridge=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting cleanpay-bridge...");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!(
        "Configuration loaded ({} configured entries, update interval {}s)",
        config.entries.len(),
        config.cleanpay.update_interval().as_secs()
    );

    let client = CleanPayClient::new(&config.cleanpay.base_url, config.cleanpay.timeout())?;
    let manager = Arc::new(EntryManager::new(
        Arc::new(client),
        config.cleanpay.update_interval(),
    ));

    // Set up configured entries; a failing entry only disables itself
    let results = futures::future::join_all(
        config
            .entries
            .iter()
            .cloned()
            .map(|credentials| manager.setup_configured(credentials)),
    )
    .await;
    for (credentials, result) in config.entries.iter().zip(results) {
        if let Err(e) = result {
            tracing::warn!(
                "Entry {}/{} setup failed (non-fatal): {}",
                credentials.user_id,
                credentials.site_code,
                e
            );
        }
    }

    let state = AppState { manager };

    // Build application router
    let cors = CorsLayer::permissive();
    let app = api::routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
