//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory implementation of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation of the
//! relational semantics (store-assigned ids, upserts, foreign keys).

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::patient::{NewPatient, Patient, PatientId};
use crate::signal::{default_catalog, Measurement, Signal, SignalId, SignalRecord};
use crate::storage::traits::{MeasurementStore, PatientStore, SignalStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

type MeasurementKey = (PatientId, SignalId, NaiveDateTime);

#[derive(Debug)]
struct State {
    signals: BTreeMap<SignalId, Signal>,
    patients: BTreeMap<PatientId, Patient>,
    measurements: BTreeMap<MeasurementKey, f64>,
    next_patient_id: i64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            signals: BTreeMap::new(),
            patients: BTreeMap::new(),
            measurements: BTreeMap::new(),
            next_patient_id: 1,
        }
    }
}

/// Thread-safe in-memory store backing all three tables.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose catalog holds `signals`.
    ///
    /// Later entries with a duplicate id replace earlier ones.
    #[must_use]
    pub fn with_catalog(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut state = State::default();
        for signal in signals {
            state.signals.insert(signal.id, signal);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Create a store seeded with [`default_catalog`].
    #[must_use]
    pub fn with_default_catalog() -> Self {
        Self::with_catalog(default_catalog())
    }

    /// Number of stored measurements.
    ///
    /// # Errors
    ///
    /// `Backend` if the state lock is poisoned.
    pub fn measurement_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("measurement.count"))?;
        Ok(state.measurements.len())
    }

    /// Every stored patient, discharged ones included, ordered by id.
    ///
    /// # Errors
    ///
    /// `Backend` if the state lock is poisoned.
    pub fn all_patients(&self) -> Result<Vec<Patient>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("patient.all"))?;
        Ok(state.patients.values().cloned().collect())
    }
}

#[async_trait]
impl SignalStore for InMemoryStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("signal.list"))?;
        Ok(state.signals.values().cloned().collect())
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("signal.insert"))?;
        if state.signals.contains_key(&signal.id) {
            return Err(StorageError::DuplicateKey(format!("signals.id={}", signal.id)));
        }
        if state.signals.values().any(|s| s.name == signal.name) {
            return Err(StorageError::DuplicateKey(format!("signals.name={}", signal.name)));
        }
        state.signals.insert(signal.id, signal.clone());
        Ok(())
    }
}

#[async_trait]
impl PatientStore for InMemoryStore {
    async fn insert_patient(&self, patient: &NewPatient) -> Result<Patient, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("patient.insert"))?;
        let id = PatientId::new(state.next_patient_id);
        state.next_patient_id += 1;

        let stored = patient.clone().with_id(id);
        state.patients.insert(id, stored.clone());
        Ok(stored)
    }

    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("patient.upsert"))?;
        state.next_patient_id = state.next_patient_id.max(patient.id.get() + 1);
        state.patients.insert(patient.id, patient.clone());
        Ok(())
    }

    async fn get_patient(&self, id: PatientId) -> Result<Option<Patient>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("patient.get"))?;
        Ok(state.patients.get(&id).cloned())
    }

    async fn list_in_unit(&self) -> Result<Vec<Patient>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("patient.list_in_unit"))?;
        Ok(state
            .patients
            .values()
            .filter(|p| p.is_in_unit())
            .cloned()
            .collect())
    }

    async fn clear_patients(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("patient.clear"))?;
        if !state.measurements.is_empty() {
            return Err(StorageError::Backend(
                "cannot clear patients while measurements reference them".to_string(),
            ));
        }
        state.patients.clear();
        state.next_patient_id = 1;
        Ok(())
    }
}

#[async_trait]
impl MeasurementStore for InMemoryStore {
    async fn upsert_measurement(&self, measurement: &Measurement) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("measurement.upsert"))?;
        if !state.patients.contains_key(&measurement.patient_id) {
            return Err(StorageError::PatientNotFound(measurement.patient_id));
        }
        if !state.signals.contains_key(&measurement.signal_id) {
            return Err(StorageError::SignalNotFound(measurement.signal_id));
        }
        state.measurements.insert(
            (measurement.patient_id, measurement.signal_id, measurement.time),
            measurement.value,
        );
        Ok(())
    }

    async fn find_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<SignalRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("measurement.find_for_patient"))?;

        let mut records = Vec::new();
        for ((pid, signal_id, time), value) in &state.measurements {
            if *pid != patient_id {
                continue;
            }
            // Inner join: rows whose signal vanished from the catalog are dropped.
            let Some(signal) = state.signals.get(signal_id) else {
                continue;
            };
            records.push(SignalRecord {
                name: signal.name.clone(),
                time: *time,
                value: *value,
            });
        }
        records.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));
        Ok(records)
    }

    async fn latest_time(&self) -> Result<Option<NaiveDateTime>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("measurement.latest_time"))?;
        Ok(state.measurements.keys().map(|(_, _, time)| *time).max())
    }

    async fn clear_measurements(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("measurement.clear"))?;
        state.measurements.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, NaiveDate};

    use crate::simulation::Bed;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn mk_patient(bed: &str) -> NewPatient {
        NewPatient {
            first_name: "Daan".to_string(),
            last_name: "Jansen".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1960, 5, 1).unwrap(),
            age: 58,
            bed: Bed::new(bed),
            datetime_admission: t0(),
        }
    }

    #[tokio::test]
    async fn patient_ids_are_assigned_sequentially_and_reset_on_clear() {
        let store = InMemoryStore::with_default_catalog();

        let a = store.insert_patient(&mk_patient("BED_01")).await.unwrap();
        let b = store.insert_patient(&mk_patient("BED_02")).await.unwrap();
        assert_eq!(a.id, PatientId::new(1));
        assert_eq!(b.id, PatientId::new(2));

        store.clear_patients().await.unwrap();
        let c = store.insert_patient(&mk_patient("BED_03")).await.unwrap();
        assert_eq!(c.id, PatientId::new(1));
    }

    #[tokio::test]
    async fn upsert_patient_overwrites_and_list_in_unit_filters_discharged() {
        let store = InMemoryStore::with_default_catalog();
        let mut a = store.insert_patient(&mk_patient("BED_01")).await.unwrap();
        let b = store.insert_patient(&mk_patient("BED_02")).await.unwrap();

        a.datetime_discharge = Some(t0() + Duration::hours(5));
        store.upsert_patient(&a).await.unwrap();

        let in_unit = store.list_in_unit().await.unwrap();
        assert_eq!(in_unit.len(), 1);
        assert_eq!(in_unit[0].id, b.id);

        let stored = store.get_patient(a.id).await.unwrap().unwrap();
        assert_eq!(stored.datetime_discharge, a.datetime_discharge);
        assert_eq!(store.all_patients().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn measurement_upsert_replaces_same_key() {
        let store = InMemoryStore::with_default_catalog();
        let p = store.insert_patient(&mk_patient("BED_01")).await.unwrap();

        let mut m = Measurement {
            patient_id: p.id,
            signal_id: SignalId::new(4),
            time: t0(),
            value: 36.9,
        };
        store.upsert_measurement(&m).await.unwrap();
        m.value = 37.4;
        store.upsert_measurement(&m).await.unwrap();

        assert_eq!(store.measurement_count().unwrap(), 1);
        let records = store.find_for_patient(p.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "temperature");
        assert!((records[0].value - 37.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn measurement_requires_known_patient_and_signal() {
        let store = InMemoryStore::with_default_catalog();
        let p = store.insert_patient(&mk_patient("BED_01")).await.unwrap();

        let unknown_patient = Measurement {
            patient_id: PatientId::new(99),
            signal_id: SignalId::new(1),
            time: t0(),
            value: 1.0,
        };
        assert!(matches!(
            store.upsert_measurement(&unknown_patient).await,
            Err(StorageError::PatientNotFound(_))
        ));

        let unknown_signal = Measurement {
            patient_id: p.id,
            signal_id: SignalId::new(99),
            time: t0(),
            value: 1.0,
        };
        assert!(matches!(
            store.upsert_measurement(&unknown_signal).await,
            Err(StorageError::SignalNotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_for_patient_orders_by_time_and_latest_time_spans_patients() {
        let store = InMemoryStore::with_default_catalog();
        let a = store.insert_patient(&mk_patient("BED_01")).await.unwrap();
        let b = store.insert_patient(&mk_patient("BED_02")).await.unwrap();

        for (pid, minutes, value) in [(a.id, 10, 2.0), (a.id, 5, 1.0), (b.id, 20, 3.0)] {
            store
                .upsert_measurement(&Measurement {
                    patient_id: pid,
                    signal_id: SignalId::new(2),
                    time: t0() + Duration::minutes(minutes),
                    value,
                })
                .await
                .unwrap();
        }

        let records = store.find_for_patient(a.id).await.unwrap();
        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);

        assert_eq!(
            store.latest_time().await.unwrap(),
            Some(t0() + Duration::minutes(20))
        );
    }

    #[tokio::test]
    async fn clear_patients_is_refused_while_measurements_exist() {
        let store = InMemoryStore::with_default_catalog();
        let p = store.insert_patient(&mk_patient("BED_01")).await.unwrap();
        store
            .upsert_measurement(&Measurement {
                patient_id: p.id,
                signal_id: SignalId::new(1),
                time: t0(),
                value: 80.0,
            })
            .await
            .unwrap();

        assert!(store.clear_patients().await.is_err());
        store.clear_measurements().await.unwrap();
        store.clear_patients().await.unwrap();
        assert!(store.latest_time().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_signal_rejects_duplicate_id_and_name() {
        let store = InMemoryStore::with_default_catalog();
        let dup_id = Signal::new(1, "lactate", 1.0, 0.5);
        assert!(matches!(
            store.insert_signal(&dup_id).await,
            Err(StorageError::DuplicateKey(_))
        ));

        let dup_name = Signal::new(42, "temperature", 37.0, 0.5);
        assert!(matches!(
            store.insert_signal(&dup_name).await,
            Err(StorageError::DuplicateKey(_))
        ));

        store
            .insert_signal(&Signal::new(42, "lactate", 1.0, 0.5))
            .await
            .unwrap();
        assert_eq!(store.list_signals().await.unwrap().len(), 6);
    }
}
