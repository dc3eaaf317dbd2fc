//! SQLite store behavior against a temporary database file.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::{tempdir, TempDir};

use icu_prediction::signal::default_catalog;
use icu_prediction::simulation::{SimulationConfig, Simulator};
use icu_prediction::storage::{connect_with_retry, RetryPolicy, Retrying};
use icu_prediction::{
    Bed, Measurement, MeasurementStore, NewPatient, PatientId, PatientStore, PredictionEngine,
    SignalId, SignalStore, SqliteStore, StorageError, Stores,
};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

async fn open() -> (SqliteStore, TempDir) {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("icu.db").display());
    let store = SqliteStore::connect(&url).await.unwrap();
    store.run_migrations().await.unwrap();
    store.seed_catalog(&default_catalog()).await.unwrap();
    (store, dir)
}

fn new_patient(bed: &str) -> NewPatient {
    NewPatient {
        first_name: "Henk".to_string(),
        last_name: "Dijkstra".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1950, 2, 14).unwrap(),
        age: 68,
        bed: Bed::new(bed),
        datetime_admission: t0(),
    }
}

fn measurement(patient: PatientId, signal: i64, minute: i64, value: f64) -> Measurement {
    Measurement {
        patient_id: patient,
        signal_id: SignalId::new(signal),
        time: t0() + Duration::minutes(minute),
        value,
    }
}

#[tokio::test]
async fn migrations_and_seeding_are_idempotent() {
    let (store, _dir) = open().await;
    store.run_migrations().await.unwrap();
    assert_eq!(store.seed_catalog(&default_catalog()).await.unwrap(), 0);

    let signals = store.list_signals().await.unwrap();
    assert_eq!(signals, default_catalog());
}

#[tokio::test]
async fn patient_round_trip_and_discharge_upsert() {
    let (store, _dir) = open().await;
    let first = store.insert_patient(&new_patient("BED_01")).await.unwrap();
    let second = store.insert_patient(&new_patient("BED_02")).await.unwrap();
    assert_ne!(first.id, second.id);

    let fetched = store.get_patient(first.id).await.unwrap().unwrap();
    assert_eq!(fetched, first);

    let mut discharged = second.clone();
    discharged.datetime_discharge = Some(t0() + Duration::hours(30));
    store.upsert_patient(&discharged).await.unwrap();

    let in_unit = store.list_in_unit().await.unwrap();
    assert_eq!(in_unit, vec![first]);
    assert_eq!(store.get_patient(second.id).await.unwrap().unwrap(), discharged);
    assert!(store.get_patient(PatientId::new(12345)).await.unwrap().is_none());
}

#[tokio::test]
async fn measurement_upsert_is_keyed_by_patient_signal_and_time() {
    let (store, _dir) = open().await;
    let patient = store.insert_patient(&new_patient("BED_01")).await.unwrap();

    store.upsert_measurement(&measurement(patient.id, 4, 1, 36.9)).await.unwrap();
    store.upsert_measurement(&measurement(patient.id, 4, 1, 37.4)).await.unwrap();
    store.upsert_measurement(&measurement(patient.id, 2, 0, 118.0)).await.unwrap();

    let records = store.find_for_patient(patient.id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "blood_pressure");
    assert_eq!(records[1].name, "temperature");
    assert_eq!(records[1].value, 37.4);
    assert_eq!(store.latest_time().await.unwrap(), Some(t0() + Duration::minutes(1)));
}

#[tokio::test]
async fn measurements_for_unknown_patients_are_rejected() {
    let (store, _dir) = open().await;
    let err = store
        .upsert_measurement(&measurement(PatientId::new(77), 1, 0, 80.0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
}

#[tokio::test]
async fn clearing_empties_both_tables() {
    let (store, _dir) = open().await;
    let patient = store.insert_patient(&new_patient("BED_01")).await.unwrap();
    store.upsert_measurement(&measurement(patient.id, 1, 0, 80.0)).await.unwrap();

    store.clear_measurements().await.unwrap();
    store.clear_patients().await.unwrap();
    assert!(store.list_in_unit().await.unwrap().is_empty());
    assert_eq!(store.latest_time().await.unwrap(), None);
    assert_eq!(store.list_signals().await.unwrap().len(), default_catalog().len());
}

#[tokio::test]
async fn duplicate_signal_is_a_duplicate_key() {
    let (store, _dir) = open().await;
    let err = store.insert_signal(&default_catalog()[0]).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey(_)));
}

#[tokio::test]
async fn simulator_and_prediction_share_the_database() {
    let (store, _dir) = open().await;
    let policy = RetryPolicy::default().initial_delay(std::time::Duration::ZERO);
    let stores = Stores::from_backend(Arc::new(Retrying::new(store.clone(), policy)));

    let mut sim = Simulator::new(
        SimulationConfig {
            seed: Some(8),
            pace: std::time::Duration::ZERO,
            measurements_per_day_per_signal: 1440.0,
            ..SimulationConfig::default()
        },
        stores.clone(),
    )
    .await
    .unwrap();
    sim.initialize().await.unwrap();
    sim.run_for(5).await.unwrap();

    assert_eq!(
        store.latest_time().await.unwrap(),
        Some(sim.config().start + Duration::minutes(4))
    );

    let engine = PredictionEngine::new(&stores);
    let patient = store.list_in_unit().await.unwrap()[0].id;
    let prediction = engine.predict(patient).await.unwrap();
    assert!(prediction.risk_probability > 0.0 && prediction.risk_probability < 1.0);
}

#[tokio::test]
async fn connect_with_retry_opens_a_new_database() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("fresh.db").display());
    let store = connect_with_retry(&RetryPolicy::no_retry(), || SqliteStore::connect(&url))
        .await
        .unwrap();
    store.run_migrations().await.unwrap();
    assert!(store.list_signals().await.unwrap().is_empty());
}
