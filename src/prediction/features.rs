//! Feature aggregation.
//!
//! Turns a patient's raw measurements into the fixed feature vector the
//! risk model consumes: age, last blood pressure, mean respiration rate
//! and the standard deviation of temperature.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PredictionError;
use crate::patient::Patient;
use crate::signal::{SignalRecord, BLOOD_PRESSURE, RESPIRATION_RATE, TEMPERATURE};

/// Model input feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Age in years at admission.
    Age,
    /// Most recent blood pressure.
    BloodPressureLast,
    /// Mean respiration rate.
    RespirationRateMean,
    /// Sample standard deviation of temperature.
    TemperatureStd,
}

impl Feature {
    /// All features, in model order.
    pub const ALL: [Self; 4] = [
        Self::Age,
        Self::BloodPressureLast,
        Self::RespirationRateMean,
        Self::TemperatureStd,
    ];

    /// Snake-case name, as serialized.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::BloodPressureLast => "blood_pressure_last",
            Self::RespirationRateMean => "respiration_rate_mean",
            Self::TemperatureStd => "temperature_std",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Feature name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<Feature, f64>);

impl FeatureVector {
    /// Empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a feature, returning the previous value.
    pub fn insert(&mut self, feature: Feature, value: f64) -> Option<f64> {
        self.0.insert(feature, value)
    }

    /// Removes a feature, returning its value.
    pub fn remove(&mut self, feature: Feature) -> Option<f64> {
        self.0.remove(&feature)
    }

    /// Value of `feature`, if present.
    #[must_use]
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.0.get(&feature).copied()
    }

    /// Returns the feature value or `MissingFeature`.
    ///
    /// # Errors
    ///
    /// `MissingFeature` when `feature` is absent.
    pub fn require(&self, feature: Feature) -> Result<f64, PredictionError> {
        self.get(feature).ok_or_else(|| PredictionError::MissingFeature {
            feature: feature.name().to_string(),
        })
    }

    /// Number of features set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no feature is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Features in model order.
    pub fn iter(&self) -> btree_map::Iter<'_, Feature, f64> {
        self.0.iter()
    }
}

impl FromIterator<(Feature, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Descriptive statistics of one signal's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    /// Number of measurements.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1). Zero for a single measurement.
    pub std: f64,
    /// Value at the latest time.
    pub last: f64,
}

impl SignalSummary {
    /// Summarizes `(time-ordered)` values; `None` when empty.
    #[allow(clippy::cast_precision_loss)]
    fn from_ordered(values: &[f64]) -> Option<Self> {
        let last = *values.last()?;
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(Self {
            count: n,
            mean,
            std,
            last,
        })
    }
}

/// Groups records by signal name and summarizes each group.
///
/// Records are ordered by time first; on equal times the input order wins.
#[must_use]
pub fn summarize(records: &[SignalRecord]) -> BTreeMap<String, SignalSummary> {
    let mut ordered: Vec<&SignalRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.time);

    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in ordered {
        grouped.entry(record.name.as_str()).or_default().push(record.value);
    }

    grouped
        .into_iter()
        .filter_map(|(name, values)| {
            SignalSummary::from_ordered(&values).map(|s| (name.to_string(), s))
        })
        .collect()
}

/// Builds [`FeatureVector`]s from patient records.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureAggregator;

impl FeatureAggregator {
    /// New aggregator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Aggregates `records` (already filtered to `patient`).
    ///
    /// # Errors
    ///
    /// `MissingSignal` naming the first required signal with no measurement.
    pub fn aggregate(
        &self,
        patient: &Patient,
        records: &[SignalRecord],
    ) -> Result<FeatureVector, PredictionError> {
        let summaries = summarize(records);
        let lookup = |signal: &str| {
            summaries
                .get(signal)
                .copied()
                .ok_or_else(|| PredictionError::MissingSignal {
                    patient_id: patient.id,
                    signal: signal.to_string(),
                })
        };

        let blood_pressure = lookup(BLOOD_PRESSURE)?;
        let respiration_rate = lookup(RESPIRATION_RATE)?;
        let temperature = lookup(TEMPERATURE)?;

        Ok(FeatureVector::from_iter([
            (Feature::Age, f64::from(patient.age)),
            (Feature::BloodPressureLast, blood_pressure.last),
            (Feature::RespirationRateMean, respiration_rate.mean),
            (Feature::TemperatureStd, temperature.std),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, NaiveDateTime};

    use crate::patient::{NewPatient, PatientId};
    use crate::simulation::Bed;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, minute, 0)
            .unwrap()
    }

    fn record(name: &str, minute: u32, value: f64) -> SignalRecord {
        SignalRecord {
            name: name.to_string(),
            time: at(minute),
            value,
        }
    }

    fn patient() -> Patient {
        NewPatient {
            first_name: "Kees".to_string(),
            last_name: "Bakker".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1964, 1, 1).unwrap(),
            age: 55,
            bed: Bed::new("BED_01"),
            datetime_admission: at(0),
        }
        .with_id(PatientId::new(1))
    }

    #[test]
    fn summary_uses_sample_std_and_latest_value() {
        // Out of time order on purpose.
        let records = vec![
            record(TEMPERATURE, 3, 38.0),
            record(TEMPERATURE, 1, 36.0),
            record(TEMPERATURE, 2, 37.0),
        ];
        let s = summarize(&records)[TEMPERATURE];
        assert_eq!(s.count, 3);
        assert!((s.mean - 37.0).abs() < 1e-12);
        assert!((s.std - 1.0).abs() < 1e-12);
        assert_eq!(s.last, 38.0);
    }

    #[test]
    fn single_measurement_has_zero_std() {
        let s = summarize(&[record(TEMPERATURE, 1, 36.6)])[TEMPERATURE];
        assert_eq!(s.std, 0.0);
        assert_eq!(s.mean, 36.6);
    }

    #[test]
    fn aggregate_produces_exactly_four_features() {
        let records = vec![
            record(BLOOD_PRESSURE, 1, 110.0),
            record(BLOOD_PRESSURE, 5, 125.0),
            record(RESPIRATION_RATE, 1, 14.0),
            record(RESPIRATION_RATE, 2, 18.0),
            record(TEMPERATURE, 1, 37.0),
            record(TEMPERATURE, 2, 38.0),
            record("heart_rate", 1, 80.0),
        ];
        let features = FeatureAggregator::new().aggregate(&patient(), &records).unwrap();

        assert_eq!(features.len(), 4);
        assert_eq!(features.get(Feature::Age), Some(55.0));
        assert_eq!(features.get(Feature::BloodPressureLast), Some(125.0));
        assert_eq!(features.get(Feature::RespirationRateMean), Some(16.0));
        let std = features.get(Feature::TemperatureStd).unwrap();
        assert!((std - 0.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn aggregate_reports_first_missing_signal() {
        let records = vec![record(BLOOD_PRESSURE, 1, 110.0), record(TEMPERATURE, 1, 37.0)];
        let err = FeatureAggregator::new()
            .aggregate(&patient(), &records)
            .unwrap_err();
        assert!(matches!(
            err,
            PredictionError::MissingSignal { ref signal, .. } if signal == RESPIRATION_RATE
        ));
    }

    #[test]
    fn feature_vector_serializes_with_snake_case_keys() {
        let v = FeatureVector::from_iter([(Feature::Age, 55.0), (Feature::TemperatureStd, 0.5)]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["age"], 55.0);
        assert_eq!(json["temperature_std"], 0.5);
    }

    #[test]
    fn require_reports_missing_feature() {
        let v = FeatureVector::new();
        let err = v.require(Feature::BloodPressureLast).unwrap_err();
        assert!(err.to_string().contains("blood_pressure_last"));
    }
}
