//! Configuration loaded from environment variables.
//!
//! Every setting has a default; binaries call `dotenvy::dotenv()` first so
//! a local `.env` file can override them.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::simulation::config::default_start;
use crate::simulation::{Bed, SimulationConfig};
use crate::storage::RetryPolicy;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address (e.g. "127.0.0.1:8080").
    pub bind_address: String,

    /// SQLite database URL.
    pub database_url: String,

    /// Backoff for the initial connection and every store call.
    pub retry: RetryPolicy,

    /// Simulator rates, capacity and pacing.
    pub simulation: SimulationConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// `Invalid` for values that do not parse, `InvalidSimulation` if the
    /// resulting simulation settings are inconsistent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SimulationConfig::default();
        let bed_labels = lookup("ICU_BED_LABELS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(Bed::new)
                .collect::<Vec<_>>()
        });
        let default_beds = bed_labels.as_ref().map_or(defaults.bed_count, Vec::len);
        let bed_count = parse_or(&lookup, "ICU_BED_COUNT", default_beds)?;

        let pace = match lookup("ICU_PACE_MS") {
            Some(raw) => {
                let ms: f64 = parse_value("ICU_PACE_MS", &raw)?;
                if !ms.is_finite() || ms < 0.0 {
                    return Err(ConfigError::invalid(
                        "ICU_PACE_MS",
                        &raw,
                        "must be a non-negative number of milliseconds",
                    ));
                }
                Duration::try_from_secs_f64(ms / 1000.0)
                    .map_err(|e| ConfigError::invalid("ICU_PACE_MS", &raw, e))?
            }
            None => defaults.pace,
        };

        let start = match lookup("ICU_SIMULATION_START") {
            Some(raw) => NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
                .map_err(|e| ConfigError::invalid("ICU_SIMULATION_START", &raw, e))?,
            None => default_start(),
        };

        let seed = match lookup("ICU_SEED") {
            Some(raw) => Some(parse_value("ICU_SEED", &raw)?),
            None => None,
        };

        let simulation = SimulationConfig {
            admissions_per_day: parse_or(
                &lookup,
                "ICU_ADMISSIONS_PER_DAY",
                defaults.admissions_per_day,
            )?,
            discharges_per_day: parse_or(
                &lookup,
                "ICU_DISCHARGES_PER_DAY",
                defaults.discharges_per_day,
            )?,
            measurements_per_day_per_signal: parse_or(
                &lookup,
                "ICU_MEASUREMENTS_PER_DAY_PER_SIGNAL",
                defaults.measurements_per_day_per_signal,
            )?,
            bed_count,
            bed_labels,
            target_average_occupancy: parse_or(
                &lookup,
                "ICU_TARGET_AVERAGE_OCCUPANCY",
                bed_count / 2,
            )?,
            start,
            step: defaults.step,
            pace,
            min_age: parse_or(&lookup, "ICU_MIN_AGE", defaults.min_age)?,
            max_age: parse_or(&lookup, "ICU_MAX_AGE", defaults.max_age)?,
            seed,
        };
        simulation.validate()?;

        let retry_defaults = RetryPolicy::default();
        let retry = retry_defaults
            .clone()
            .max_attempts(parse_or(&lookup, "ICU_CONNECT_ATTEMPTS", retry_defaults.max_attempts)?)
            .initial_delay(Duration::from_millis(parse_or(
                &lookup,
                "ICU_CONNECT_BACKOFF_MS",
                200_u64,
            )?));

        Ok(Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".into()),
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:icu.db".into()),
            retry,
            simulation,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, raw, e))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to a value that does not parse.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        /// Variable name.
        key: String,
        /// Raw value as found.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// Simulation settings are individually valid but inconsistent.
    #[error("Invalid simulation settings: {reason}")]
    InvalidSimulation {
        /// What is wrong.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Display) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
