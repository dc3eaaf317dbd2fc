//! Signal catalog and measurements.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::patient::PatientId;

/// Name of the blood pressure signal.
pub const BLOOD_PRESSURE: &str = "blood_pressure";
/// Name of the respiration rate signal.
pub const RESPIRATION_RATE: &str = "respiration_rate";
/// Name of the body temperature signal.
pub const TEMPERATURE: &str = "temperature";

/// Catalog identifier of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(i64);

impl SignalId {
    /// Wraps a raw store identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw store identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monitored vital sign with the population parameters used to
/// synthesize plausible values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Catalog id.
    pub id: SignalId,
    /// Unique name, e.g. `temperature`.
    pub name: String,
    /// Mean of generated values.
    pub population_mean: f64,
    /// Standard deviation of generated values.
    pub population_std: f64,
}

impl Signal {
    /// Creates a catalog entry.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, population_mean: f64, population_std: f64) -> Self {
        Self {
            id: SignalId::new(id),
            name: name.into(),
            population_mean,
            population_std,
        }
    }
}

/// Catalog seeded into an empty store.
#[must_use]
pub fn default_catalog() -> Vec<Signal> {
    vec![
        Signal::new(1, "heart_rate", 80.0, 12.0),
        Signal::new(2, BLOOD_PRESSURE, 120.0, 15.0),
        Signal::new(3, RESPIRATION_RATE, 16.0, 3.0),
        Signal::new(4, TEMPERATURE, 37.0, 0.5),
        Signal::new(5, "oxygen_saturation", 97.0, 2.0),
    ]
}

/// A single recorded value, keyed by (patient, signal, time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Measured patient.
    pub patient_id: PatientId,
    /// Measured signal.
    pub signal_id: SignalId,
    /// Simulated measurement time.
    pub time: NaiveDateTime,
    /// Measured value.
    pub value: f64,
}

/// A measurement joined with its signal name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Signal name.
    pub name: String,
    /// Simulated measurement time.
    pub time: NaiveDateTime,
    /// Measured value.
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_contains_required_signals() {
        let catalog = default_catalog();
        for name in [BLOOD_PRESSURE, RESPIRATION_RATE, TEMPERATURE] {
            assert!(catalog.iter().any(|s| s.name == name), "missing {name}");
        }
    }

    #[test]
    fn default_catalog_ids_are_unique() {
        let catalog = default_catalog();
        let mut ids: Vec<_> = catalog.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }
}
