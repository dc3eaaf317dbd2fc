//! Request-scoped prediction pipeline: fetch, aggregate, score.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IcuResult, PredictionError};
use crate::patient::{Patient, PatientId};
use crate::storage::{MeasurementStore, PatientStore, Stores};

use super::features::{FeatureAggregator, FeatureVector};
use super::scorer::RiskScorer;

/// Scored patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Scored patient.
    pub patient: Patient,
    /// Model inputs used.
    pub features: FeatureVector,
    /// Model output.
    pub risk_probability: f64,
}

/// Computes risk predictions from stored measurements.
#[derive(Clone)]
pub struct PredictionEngine {
    patients: Arc<dyn PatientStore>,
    measurements: Arc<dyn MeasurementStore>,
    aggregator: FeatureAggregator,
    scorer: RiskScorer,
}

impl std::fmt::Debug for PredictionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionEngine")
            .field("scorer", &self.scorer)
            .finish_non_exhaustive()
    }
}

impl PredictionEngine {
    /// Engine over `stores` with the reference model.
    #[must_use]
    pub fn new(stores: &Stores) -> Self {
        Self::with_scorer(stores, RiskScorer::default())
    }

    /// Engine over `stores` with a custom scorer.
    #[must_use]
    pub fn with_scorer(stores: &Stores, scorer: RiskScorer) -> Self {
        Self {
            patients: Arc::clone(&stores.patients),
            measurements: Arc::clone(&stores.measurements),
            aggregator: FeatureAggregator::new(),
            scorer,
        }
    }

    /// Predicts the risk of one patient.
    ///
    /// Discharged patients are scored too; their history stays in the store.
    ///
    /// # Errors
    ///
    /// - `UnknownPatient` if no patient has `id`
    /// - `MissingSignal` if a required signal was never measured
    /// - store errors
    pub async fn predict(&self, id: PatientId) -> IcuResult<Prediction> {
        let patient = self
            .patients
            .get_patient(id)
            .await?
            .ok_or(PredictionError::UnknownPatient { id })?;
        let records = self.measurements.find_for_patient(id).await?;

        let features = self.aggregator.aggregate(&patient, &records)?;
        let risk_probability = self.scorer.predict(&features)?;
        debug!(
            patient_id = %id,
            records = records.len(),
            risk_probability,
            "prediction computed"
        );

        Ok(Prediction {
            patient,
            features,
            risk_probability,
        })
    }
}
