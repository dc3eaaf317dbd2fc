//! Abstract storage traits.
//!
//! One trait per table. Backends implement all three so a single handle can
//! be shared between the simulator and the API:
//! - In-memory backend for tests and embedded use
//! - SQLite backend for production

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::patient::{NewPatient, Patient, PatientId};
use crate::signal::{Measurement, Signal, SignalId, SignalRecord};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Patient not found.
    #[error("Patient not found: {0}")]
    PatientNotFound(PatientId),

    /// Signal not found.
    #[error("Signal not found: {0}")]
    SignalNotFound(SignalId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Transient failure before the call reached the store; safe to retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Connection lost mid-call. A write may or may not have been applied.
    #[error("Store connection interrupted: {0}")]
    Interrupted(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be mapped to a domain type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl StorageError {
    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Interrupted(_))
    }

    /// Returns true if the failed call is known to have had no effect.
    #[must_use]
    pub const fn is_unapplied(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Storage trait for the signal catalog.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// List the whole catalog, ordered by id.
    async fn list_signals(&self) -> Result<Vec<Signal>, StorageError>;

    /// Insert a catalog entry. Returns error if the id or name already exists.
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StorageError>;
}

/// Storage trait for patient records.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Insert a new patient; the store assigns the id.
    async fn insert_patient(&self, patient: &NewPatient) -> Result<Patient, StorageError>;

    /// Insert or overwrite a patient by id.
    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError>;

    /// Get a patient by id.
    async fn get_patient(&self, id: PatientId) -> Result<Option<Patient>, StorageError>;

    /// Patients without a discharge timestamp, ordered by id.
    async fn list_in_unit(&self) -> Result<Vec<Patient>, StorageError>;

    /// Remove every patient.
    async fn clear_patients(&self) -> Result<(), StorageError>;
}

/// Storage trait for measurements (`patient_signal_values`).
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Insert, or overwrite the value stored for the same
    /// (patient, signal, time) key.
    async fn upsert_measurement(&self, measurement: &Measurement) -> Result<(), StorageError>;

    /// All measurements of a patient joined with signal names, ordered by time.
    async fn find_for_patient(&self, patient_id: PatientId)
        -> Result<Vec<SignalRecord>, StorageError>;

    /// Latest measurement time across all patients.
    async fn latest_time(&self) -> Result<Option<NaiveDateTime>, StorageError>;

    /// Remove every measurement.
    async fn clear_measurements(&self) -> Result<(), StorageError>;
}
