use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mike_carcass_api::auth::{CredentialVault, SystemClock, TokenAuthority};
use mike_carcass_api::config;
use mike_carcass_api::database::{DatabaseManager, RecordStore};
use mike_carcass_api::routes;
use mike_carcass_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, TOKEN_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mike_carcass_api=info,tower_http=info")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting MIKE Carcass API in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open record database")?;

    let vault = CredentialVault::new(&config.security.credential_path);
    if !vault.path().exists() {
        tracing::warn!(
            "No master credential at {}; logins will fail until `mike set-password` is run",
            vault.path().display()
        );
    }

    let tokens = TokenAuthority::new(vault, &config.security.token_secret, Arc::new(SystemClock))
        .context("set TOKEN_SECRET before starting the server")?;

    let state = AppState::new(RecordStore::new(pool), tokens);
    let app = routes::app(state, config);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("MIKE Carcass API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
