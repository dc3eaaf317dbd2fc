//! Error types for the ICU simulator and prediction pipeline.
//!
//! Every layer has its own strongly typed error (storage, prediction,
//! simulation invariants, configuration). They are aggregated into
//! [`IcuError`] so callers can match on the failure class.

use thiserror::Error;

use crate::config::ConfigError;
use crate::patient::PatientId;
use crate::simulation::Bed;
use crate::storage::StorageError;

/// Failures of the prediction pipeline (aggregation and scoring).
#[derive(Debug, Error)]
pub enum PredictionError {
    /// No patient with this id exists.
    #[error("Patient not found: {id}")]
    UnknownPatient {
        /// Requested id.
        id: PatientId,
    },

    /// A model input signal was never measured for the patient.
    #[error("Required signal '{signal}' has no measurements for patient {patient_id}")]
    MissingSignal {
        /// Patient being scored.
        patient_id: PatientId,
        /// Signal name.
        signal: String,
    },

    /// The feature vector lacks a model input.
    #[error("Required feature '{feature}' is missing")]
    MissingFeature {
        /// Feature name.
        feature: String,
    },
}

/// Programming defects detected by the simulation.
///
/// These are never retried: continuing with a corrupted bed pool or patient
/// set would silently drift the simulated state.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    /// Release of a bed that is not occupied.
    #[error("Bed {bed} is already free")]
    BedAlreadyFree {
        /// Offending bed.
        bed: Bed,
    },

    /// Release of a bed outside the pool.
    #[error("Bed {bed} does not belong to the bed pool")]
    UnknownBed {
        /// Offending bed.
        bed: Bed,
    },

    /// Forced admission with a full unit.
    #[error("Forced admission requested but no bed is free")]
    NoFreeBed,

    /// Second discharge of the same patient.
    #[error("Patient {id} was already discharged")]
    AlreadyDischarged {
        /// Patient id.
        id: PatientId,
    },

    /// Discharge of a patient the controller does not hold.
    #[error("Patient {id} is not in the unit")]
    PatientNotInUnit {
        /// Patient id.
        id: PatientId,
    },

    /// Catalog signal with a non-finite mean or an unusable std.
    #[error("Signal '{signal}' has an invalid distribution (mean {mean}, std {std})")]
    InvalidSignalDistribution {
        /// Signal name.
        signal: String,
        /// Population mean.
        mean: f64,
        /// Population standard deviation.
        std: f64,
    },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum IcuError {
    /// Store failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Prediction pipeline failure.
    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    /// Simulation invariant broken.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl IcuError {
    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a prediction error.
    #[must_use]
    pub const fn is_prediction(&self) -> bool {
        matches!(self, Self::Prediction(_))
    }

    /// Returns true if this is an invariant violation.
    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Only transient store unavailability qualifies.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Prediction(_) | Self::Invariant(_) | Self::Config(_) => false,
        }
    }
}

/// Result type alias for crate operations.
pub type IcuResult<T> = Result<T, IcuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_error_missing_signal() {
        let err = PredictionError::MissingSignal {
            patient_id: PatientId::new(7),
            signal: "temperature".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("temperature"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_invariant_bed_already_free() {
        let err = InvariantViolation::BedAlreadyFree {
            bed: Bed::new("BED_03"),
        };
        assert!(err.to_string().contains("BED_03"));
    }

    #[test]
    fn test_icu_error_from_storage_unavailable_is_retryable() {
        let err: IcuError = StorageError::Unavailable("connection refused".to_string()).into();
        assert!(err.is_storage());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_icu_error_from_backend_is_not_retryable() {
        let err: IcuError = StorageError::Backend("syntax error".to_string()).into();
        assert!(err.is_storage());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_icu_error_invariant_is_not_retryable() {
        let err: IcuError = InvariantViolation::NoFreeBed.into();
        assert!(err.is_invariant());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_icu_error_from_prediction() {
        let err: IcuError = PredictionError::MissingFeature {
            feature: "age".to_string(),
        }
        .into();
        assert!(err.is_prediction());
        assert!(!err.is_retryable());
    }
}
