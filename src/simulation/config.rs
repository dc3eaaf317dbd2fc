//! Simulation parameters.

use std::time::Duration as WallDuration;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::config::ConfigError;

use super::beds::{Bed, BedPool};

/// Minutes in a simulated day.
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Rates, capacities and pacing for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Expected admissions per simulated day.
    pub admissions_per_day: f64,
    /// Expected discharges per day at target occupancy.
    pub discharges_per_day: f64,
    /// Expected measurements per day, per patient and signal.
    pub measurements_per_day_per_signal: f64,
    /// Number of beds in the unit.
    pub bed_count: usize,
    /// Explicit bed labels; `None` numbers the beds `BED_01`, `BED_02`, ...
    /// When set, the distinct labels must number exactly `bed_count`.
    pub bed_labels: Option<Vec<Bed>>,
    /// Occupancy the discharge feedback pulls towards; also the number of
    /// forced admissions at start-up.
    pub target_average_occupancy: usize,
    /// Simulated time of the first step.
    pub start: NaiveDateTime,
    /// Simulated time per step.
    pub step: Duration,
    /// Wall-clock pause per step. Zero runs flat out.
    pub pace: WallDuration,
    /// Youngest generated patient, in years.
    pub min_age: u32,
    /// Oldest generated patient, in years.
    pub max_age: u32,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            admissions_per_day: 2.0,
            discharges_per_day: 2.0,
            measurements_per_day_per_signal: 144.0,
            bed_count: 24,
            bed_labels: None,
            target_average_occupancy: 12,
            start: default_start(),
            step: Duration::minutes(1),
            pace: WallDuration::from_secs(1) / 24,
            min_age: 10,
            max_age: 100,
            seed: None,
        }
    }
}

/// `2019-01-01 00:00:00`.
#[must_use]
pub fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl SimulationConfig {
    /// Steps per simulated day; 1440 for one-minute steps.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn steps_per_day(&self) -> f64 {
        let step_secs = self.step.num_seconds().max(1) as f64;
        MINUTES_PER_DAY * 60.0 / step_secs
    }

    /// Builds an all-free pool from `bed_labels` or `bed_count`.
    #[must_use]
    pub fn bed_pool(&self) -> BedPool {
        match &self.bed_labels {
            Some(labels) => BedPool::new(labels.iter().cloned()),
            None => BedPool::numbered(self.bed_count),
        }
    }

    /// Per-step admission probability.
    #[must_use]
    pub fn admission_probability(&self) -> f64 {
        self.admissions_per_day / self.steps_per_day()
    }

    /// Per-step discharge probability given the current in-unit count.
    ///
    /// Scales with `in_unit / target`, so occupancy drifts back to target.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn discharge_probability(&self, in_unit: usize) -> f64 {
        if self.target_average_occupancy == 0 {
            return 0.0;
        }
        let load = in_unit as f64 / self.target_average_occupancy as f64;
        self.discharges_per_day * load / self.steps_per_day()
    }

    /// Per-step probability of measuring one signal of one patient.
    #[must_use]
    pub fn measurement_probability(&self) -> f64 {
        self.measurements_per_day_per_signal / self.steps_per_day()
    }

    /// Validate the configuration.
    ///
    /// This must be called before constructing a `Simulator`.
    ///
    /// # Errors
    ///
    /// `InvalidSimulation` naming the first inconsistent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("admissions_per_day", self.admissions_per_day),
            ("discharges_per_day", self.discharges_per_day),
            (
                "measurements_per_day_per_signal",
                self.measurements_per_day_per_signal,
            ),
        ];
        for (name, rate) in rates {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::InvalidSimulation {
                    reason: format!("{name} must be a finite, non-negative rate (got {rate})"),
                });
            }
        }
        if self.bed_labels.is_some() {
            let distinct = self.bed_pool().capacity();
            if distinct != self.bed_count {
                return Err(ConfigError::InvalidSimulation {
                    reason: format!(
                        "{distinct} distinct bed labels given for bed_count {}",
                        self.bed_count
                    ),
                });
            }
        }
        if self.target_average_occupancy == 0 {
            return Err(ConfigError::InvalidSimulation {
                reason: "target_average_occupancy must be > 0".to_string(),
            });
        }
        if self.target_average_occupancy > self.bed_count {
            return Err(ConfigError::InvalidSimulation {
                reason: format!(
                    "target_average_occupancy ({}) exceeds bed_count ({})",
                    self.target_average_occupancy, self.bed_count
                ),
            });
        }
        if self.min_age > self.max_age {
            return Err(ConfigError::InvalidSimulation {
                reason: format!(
                    "min_age ({}) must not exceed max_age ({})",
                    self.min_age, self.max_age
                ),
            });
        }
        if self.step < Duration::seconds(1) {
            return Err(ConfigError::InvalidSimulation {
                reason: "step must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}
