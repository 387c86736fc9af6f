use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shopbot::bot::TelegramOutbox;
use shopbot::config::AppConfig;
use shopbot::currency_cache::SystemClock;
use shopbot::db::PgStore;
use shopbot::payments::nowpayments::NowPaymentsClient;
use shopbot::web::{self, AppState};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    info!(bind_addr = %config.bind_addr, public_url = %config.public_url, "Starting shop bot server");

    let store = PgStore::connect(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection and schema initialized");

    let gateway = NowPaymentsClient::new(&config.payment)
        .context("Failed to build payment provider client")?;
    if config.payment.api_key.is_none() {
        warn!("NOWPAYMENTS_API_KEY is not set, checkout is disabled");
    }
    if config.payment.ipn_secret.is_none() {
        warn!("NOWPAYMENTS_IPN_SECRET is not set, payment notifications will be rejected");
    }

    let state = AppState::new(
        &config,
        Arc::new(store),
        Arc::new(gateway),
        Arc::new(SystemClock),
        Arc::new(TelegramOutbox::new()),
    );
    let app = web::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(bind_addr = %config.bind_addr, "Listening for webhooks");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
