//! ICU flow simulator
//!
//! Streams simulated admissions, discharges and vital signs into the
//! configured SQLite database until Ctrl+C.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;

use icu_prediction::config::Config;
use icu_prediction::signal::default_catalog;
use icu_prediction::simulation::Simulator;
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
    store.seed_catalog(&default_catalog()).await?;

    let stores = Stores::from_backend(Arc::new(Retrying::new(store, config.retry.clone())));
    let mut simulator = Simulator::new(config.simulation.clone(), stores).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for Ctrl+C");
        }
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let summary = simulator.run(shutdown_rx).await?;
    tracing::info!(
        run_id = %summary.run_id,
        steps = summary.steps,
        simulated_until = %summary.simulated_until,
        "shut down"
    );
    Ok(())
}
