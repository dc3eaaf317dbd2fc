//! Patient records.
//!
//! A patient row is created on admission and updated exactly once more, on
//! discharge. The record persists after discharge; only the in-unit set
//! forgets it.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::simulation::Bed;

/// Store-assigned patient identifier.
///
/// Identifiers only exist after the first insert; see [`NewPatient`] for
/// the pre-insert shape.
///
/// # Examples
///
/// ```
/// use icu_prediction::PatientId;
///
/// let id = PatientId::new(42);
/// assert_eq!(id.get(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(i64);

impl PatientId {
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

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PatientId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<PatientId> for i64 {
    fn from(id: PatientId) -> Self {
        id.0
    }
}

/// A patient that has been admitted but not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Whole years at admission.
    pub age: u32,
    /// Assigned bed.
    pub bed: Bed,
    /// Simulated admission time.
    pub datetime_admission: NaiveDateTime,
}

impl NewPatient {
    /// Attaches the store-assigned identifier.
    #[must_use]
    pub fn with_id(self, id: PatientId) -> Patient {
        Patient {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            age: self.age,
            bed: self.bed,
            datetime_admission: self.datetime_admission,
            datetime_discharge: None,
        }
    }
}

/// A persisted patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Store-assigned id.
    pub id: PatientId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Whole years at admission.
    pub age: u32,
    /// Bed held during the stay.
    pub bed: Bed,
    /// Simulated admission time.
    pub datetime_admission: NaiveDateTime,
    /// Set exactly once, on discharge.
    pub datetime_discharge: Option<NaiveDateTime>,
}

impl Patient {
    /// Returns true while the patient has no discharge recorded.
    #[must_use]
    pub const fn is_in_unit(&self) -> bool {
        self.datetime_discharge.is_none()
    }
}

/// Age in whole years, counting 365-day years.
///
/// Returns 0 for birth dates after `on`.
#[must_use]
pub fn age_in_years(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    let days = (on - date_of_birth).num_days();
    u32::try_from(days / 365).unwrap_or(0)
}
