//! Logistic risk model.

use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

use super::features::{Feature, FeatureVector};

/// Coefficients of the linear predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    /// Constant term.
    pub intercept: f64,
    /// Per year of age.
    pub age: f64,
    /// Per mmHg of the last blood pressure.
    pub blood_pressure_last: f64,
    /// Per breath/min of the mean respiration rate.
    pub respiration_rate_mean: f64,
    /// Per degree of temperature standard deviation.
    pub temperature_std: f64,
}

impl RiskModel {
    /// The toy reference model.
    pub const REFERENCE: Self = Self {
        intercept: -5.0,
        age: 0.1,
        blood_pressure_last: 0.001,
        respiration_rate_mean: 0.03,
        temperature_std: 0.02,
    };

    /// Coefficient applied to `feature`.
    #[must_use]
    pub const fn coefficient(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Age => self.age,
            Feature::BloodPressureLast => self.blood_pressure_last,
            Feature::RespirationRateMean => self.respiration_rate_mean,
            Feature::TemperatureStd => self.temperature_std,
        }
    }
}

impl Default for RiskModel {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Logistic function, stable for large `|x|`.
///
/// Never NaN. In `f64` the result rounds to exactly `1.0` above roughly
/// `x = 37` and to exactly `0.0` below roughly `x = -745`.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Scores feature vectors with a [`RiskModel`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskScorer {
    model: RiskModel,
}

impl RiskScorer {
    /// Scorer over `model`.
    #[must_use]
    pub const fn new(model: RiskModel) -> Self {
        Self { model }
    }

    /// Coefficients in use.
    #[must_use]
    pub const fn model(&self) -> &RiskModel {
        &self.model
    }

    /// `intercept + sum(coefficient * feature)`.
    ///
    /// # Errors
    ///
    /// `MissingFeature` if any model feature is absent.
    pub fn linear_predictor(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        Feature::ALL
            .iter()
            .try_fold(self.model.intercept, |acc, &feature| -> Result<f64, PredictionError> {
                Ok(acc + self.model.coefficient(feature) * features.require(feature)?)
            })
    }

    /// Risk probability.
    ///
    /// Strictly inside (0, 1) for physiologically plausible inputs. A linear
    /// predictor beyond the saturation points of [`sigmoid`] yields exactly
    /// `0.0` or `1.0`.
    ///
    /// # Errors
    ///
    /// `MissingFeature` if any model feature is absent.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        self.linear_predictor(features).map(sigmoid)
    }
}
