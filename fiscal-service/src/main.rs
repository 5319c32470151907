use dotenvy::dotenv;
use fiscal_core::config::Config;
use fiscal_core::crypto::AesGcmCipher;
use fiscal_core::observability::logging::init_tracing;
use fiscal_service::handlers::{build_router, AppState};
use fiscal_service::services::Database;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = Config::from_env().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        &configuration.service_name,
        &configuration.observability.log_level,
        &configuration.observability.otlp_endpoint,
    );

    fiscal_service::services::metrics::init_metrics();

    let db = Database::new(
        configuration.database.url.expose_secret(),
        configuration.database.max_connections,
        configuration.database.min_connections,
    )
    .await?;
    db.run_migrations().await?;

    let state = AppState {
        db: Arc::new(db),
        cipher: Arc::new(AesGcmCipher::new(&configuration.secrets.cipher_key)),
    };

    let app = build_router(state);

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting fiscal-service on {}", address);
    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
