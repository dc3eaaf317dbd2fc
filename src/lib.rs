//! # ICU patient-flow simulator and risk prediction
//!
//! Two cooperating halves share one store:
//!
//! - **Simulation**: a minute-by-minute stochastic model of an intensive care
//!   unit. Patients are admitted into a fixed bed pool, vital signs are drawn
//!   from per-signal normal distributions, and discharges follow a feedback
//!   rule that keeps occupancy near a target.
//! - **Prediction**: a request-scoped pipeline that aggregates a patient's
//!   measurements into a feature vector and scores it with a logistic model,
//!   exposed over HTTP.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use icu_prediction::{InMemoryStore, PredictionEngine, SimulationConfig, Simulator, Stores};
//!
//! let stores = Stores::from_backend(Arc::new(InMemoryStore::with_default_catalog()));
//! let mut sim = Simulator::new(SimulationConfig::default(), stores.clone()).await?;
//! sim.initialize().await?;
//! sim.run_for(24 * 60).await?;
//!
//! let engine = PredictionEngine::new(&stores);
//! let prediction = engine.predict(sim.in_unit()[0].id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod error;
pub mod patient;
pub mod prediction;
pub mod signal;
pub mod simulation;
pub mod storage;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use error::{IcuError, IcuResult, InvariantViolation, PredictionError};
pub use patient::{NewPatient, Patient, PatientId};
pub use prediction::{Feature, FeatureVector, Prediction, PredictionEngine, RiskModel, RiskScorer};
pub use signal::{Measurement, Signal, SignalId, SignalRecord};
pub use simulation::{Bed, BedPool, RunSummary, SimulationConfig, Simulator, StepReport};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
pub use storage::{
    InMemoryStore, MeasurementStore, PatientStore, RetryPolicy, SignalStore, StorageError, Stores,
};
