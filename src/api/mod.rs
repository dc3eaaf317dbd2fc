//! HTTP API.

mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::prediction::PredictionEngine;
use crate::storage::Stores;

pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Stores read by the list and time routes.
    pub stores: Stores,
    /// Engine behind the prediction route.
    pub engine: Arc<PredictionEngine>,
}

impl AppState {
    /// State with the reference risk model.
    #[must_use]
    pub fn new(stores: Stores) -> Self {
        let engine = Arc::new(PredictionEngine::new(&stores));
        Self { stores, engine }
    }
}

/// Builds the router with tracing and permissive CORS.
#[must_use]
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/get_patients_in_ic", get(handlers::get_patients_in_ic))
        .route(
            "/get_prediction_for_single_patient/:patient_id",
            get(handlers::get_prediction_for_single_patient),
        )
        .route(
            "/get_current_simulated_time",
            get(handlers::get_current_simulated_time),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
