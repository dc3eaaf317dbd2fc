//! Storage layer.
//!
//! Traits define the contract per table; backends live in submodules.
//! [`Stores`] bundles trait-object handles so components receive their
//! store session explicitly instead of through module-level state.

mod memory;
mod retry;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

use std::sync::Arc;

pub use memory::InMemoryStore;
pub use retry::{connect_with_retry, RetryPolicy, Retrying};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use traits::{MeasurementStore, PatientStore, SignalStore, StorageError};

/// Handles to the three tables, usually backed by one store.
#[derive(Clone)]
pub struct Stores {
    /// Signal catalog.
    pub signals: Arc<dyn SignalStore>,
    /// Patient records.
    pub patients: Arc<dyn PatientStore>,
    /// Recorded measurements.
    pub measurements: Arc<dyn MeasurementStore>,
}

impl Stores {
    /// Share a single backend for all three tables.
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SignalStore + PatientStore + MeasurementStore + 'static,
    {
        Self {
            signals: Arc::clone(&backend) as Arc<dyn SignalStore>,
            patients: Arc::clone(&backend) as Arc<dyn PatientStore>,
            measurements: backend,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
