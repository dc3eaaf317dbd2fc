//! Prediction pipeline over stored measurements.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use icu_prediction::signal::default_catalog;
use icu_prediction::simulation::{SimulationConfig, Simulator};
use icu_prediction::{
    Bed, Feature, IcuError, InMemoryStore, Measurement, MeasurementStore, NewPatient, Patient,
    PatientId, PatientStore, PredictionEngine, PredictionError, SignalId, Stores,
};

const BLOOD_PRESSURE: SignalId = SignalId::new(2);
const RESPIRATION_RATE: SignalId = SignalId::new(3);
const TEMPERATURE: SignalId = SignalId::new(4);

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

async fn admit(store: &InMemoryStore, age: u32) -> Patient {
    store
        .insert_patient(&NewPatient {
            first_name: "Joost".to_string(),
            last_name: "Visser".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1964, 1, 1).unwrap(),
            age,
            bed: Bed::new("BED_05"),
            datetime_admission: t0(),
        })
        .await
        .unwrap()
}

async fn record(store: &InMemoryStore, patient: PatientId, signal: SignalId, minute: i64, value: f64) {
    store
        .upsert_measurement(&Measurement {
            patient_id: patient,
            signal_id: signal,
            time: t0() + Duration::minutes(minute),
            value,
        })
        .await
        .unwrap();
}

fn engine(store: &Arc<InMemoryStore>) -> PredictionEngine {
    PredictionEngine::new(&Stores::from_backend(Arc::clone(store)))
}

#[tokio::test]
async fn reference_patient_is_scored_from_stored_measurements() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let patient = admit(&store, 55).await;

    record(&store, patient.id, BLOOD_PRESSURE, 1, 130.0).await;
    record(&store, patient.id, BLOOD_PRESSURE, 9, 120.0).await;
    record(&store, patient.id, RESPIRATION_RATE, 2, 14.0).await;
    record(&store, patient.id, RESPIRATION_RATE, 3, 18.0).await;
    record(&store, patient.id, TEMPERATURE, 1, 36.5).await;
    record(&store, patient.id, TEMPERATURE, 2, 37.0).await;
    record(&store, patient.id, TEMPERATURE, 3, 37.5).await;
    // Heart rate is measured but not a model input.
    record(&store, patient.id, SignalId::new(1), 3, 90.0).await;

    let prediction = engine(&store).predict(patient.id).await.unwrap();
    assert_eq!(prediction.patient, patient);
    assert_eq!(prediction.features.len(), 4);
    assert_eq!(prediction.features.get(Feature::BloodPressureLast), Some(120.0));
    assert_eq!(prediction.features.get(Feature::RespirationRateMean), Some(16.0));
    let temp_std = prediction.features.get(Feature::TemperatureStd).unwrap();
    assert!((temp_std - 0.5).abs() < 1e-12);
    assert_eq!(prediction.features.get(Feature::Age), Some(55.0));
    assert!((prediction.risk_probability - 0.7521).abs() < 1e-4);
}

#[tokio::test]
async fn missing_signal_is_reported_by_name() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let patient = admit(&store, 70).await;
    record(&store, patient.id, BLOOD_PRESSURE, 1, 120.0).await;
    record(&store, patient.id, RESPIRATION_RATE, 1, 16.0).await;

    let err = engine(&store).predict(patient.id).await.unwrap_err();
    assert!(matches!(
        err,
        IcuError::Prediction(PredictionError::MissingSignal { ref signal, patient_id })
            if signal == "temperature" && patient_id == patient.id
    ));
}

#[tokio::test]
async fn unknown_patient_is_not_found() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let err = engine(&store).predict(PatientId::new(404)).await.unwrap_err();
    assert!(matches!(
        err,
        IcuError::Prediction(PredictionError::UnknownPatient { id }) if id == PatientId::new(404)
    ));
}

#[tokio::test]
async fn discharged_patients_can_still_be_scored() {
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let mut patient = admit(&store, 40).await;
    for (signal, value) in [(BLOOD_PRESSURE, 118.0), (RESPIRATION_RATE, 15.0), (TEMPERATURE, 37.1)] {
        record(&store, patient.id, signal, 1, value).await;
    }
    patient.datetime_discharge = Some(t0() + Duration::hours(6));
    store.upsert_patient(&patient).await.unwrap();

    let prediction = engine(&store).predict(patient.id).await.unwrap();
    assert_eq!(prediction.features.get(Feature::TemperatureStd), Some(0.0));
    assert!(prediction.risk_probability > 0.0 && prediction.risk_probability < 1.0);
}

#[tokio::test]
async fn simulated_patients_are_scorable_after_a_day() {
    let store = Arc::new(InMemoryStore::with_catalog(default_catalog()));
    let stores = Stores::from_backend(Arc::clone(&store));
    let mut sim = Simulator::new(
        SimulationConfig {
            seed: Some(99),
            pace: std::time::Duration::ZERO,
            ..SimulationConfig::default()
        },
        stores.clone(),
    )
    .await
    .unwrap();
    sim.initialize().await.unwrap();
    sim.run_for(24 * 60).await.unwrap();

    let engine = PredictionEngine::new(&stores);
    let mut scored = 0;
    for patient in store.list_in_unit().await.unwrap() {
        match engine.predict(patient.id).await {
            Ok(prediction) => {
                assert!(prediction.risk_probability > 0.0 && prediction.risk_probability < 1.0);
                scored += 1;
            }
            // A patient admitted minutes ago may not have every signal yet.
            Err(IcuError::Prediction(PredictionError::MissingSignal { .. })) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(scored > 0);
}
