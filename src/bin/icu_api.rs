//! ICU prediction API server
//!
//! Serves the in-unit patient list and per-patient risk predictions over
//! HTTP from the database the simulator writes to.

use std::sync::Arc;

use tokio::signal;

use icu_prediction::api::{self, AppState};
use icu_prediction::config::Config;
use icu_prediction::storage::{connect_with_retry, Retrying, SqliteStore, Stores};
use icu_prediction::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    telemetry::init_tracing();
    if let Err(err) = dotenv {
        tracing::debug!(error = %err, "no .env file loaded");
    }

    let config = Config::from_env()?;
    tracing::info!(database_url = %config.database_url, "opening store");

    let store = connect_with_retry(&config.retry, || SqliteStore::connect(&config.database_url)).await?;
    store.run_migrations().await?;

    let stores = Stores::from_backend(Arc::new(Retrying::new(store, config.retry.clone())));
    let app = api::router(AppState::new(stores));

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("ICU prediction API listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    tracing::info!("shut down");
    Ok(())
}
