use std::hint::black_box;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use icu_prediction::prediction::{FeatureAggregator, RiskScorer};
use icu_prediction::signal::{default_catalog, SignalRecord};
use icu_prediction::{
    Bed, InMemoryStore, Measurement, MeasurementStore, NewPatient, Patient, PatientId,
    PatientStore, PredictionEngine, Stores,
};

fn patient() -> NewPatient {
    NewPatient {
        first_name: "Willemijn".to_string(),
        last_name: "Bos".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1948, 9, 30).unwrap(),
        age: 70,
        bed: Bed::new("BED_12"),
        datetime_admission: NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    }
}

// One simulated day at the default rate: 144 values per signal.
fn day_of_records(start: &NewPatient) -> Vec<SignalRecord> {
    let mut records = Vec::new();
    for signal in default_catalog() {
        for i in 0..144_u32 {
            records.push(SignalRecord {
                name: signal.name.clone(),
                time: start.datetime_admission + Duration::minutes(i64::from(i) * 10),
                value: signal.population_mean + f64::from(i % 7) * 0.1,
            });
        }
    }
    records
}

fn bench_aggregate_and_score(c: &mut Criterion) {
    let new_patient = patient();
    let records = day_of_records(&new_patient);
    let patient: Patient = new_patient.with_id(PatientId::new(1));
    let aggregator = FeatureAggregator::new();
    let scorer = RiskScorer::default();

    let mut group = c.benchmark_group("prediction");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("aggregate_and_score_one_day", |b| {
        b.iter(|| {
            let features = aggregator
                .aggregate(black_box(&patient), black_box(&records))
                .unwrap();
            black_box(scorer.predict(&features).unwrap())
        });
    });
    group.finish();
}

fn bench_engine_in_memory(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let store = Arc::new(InMemoryStore::with_default_catalog());
    let new_patient = patient();
    let id = runtime.block_on(async {
        let stored = store.insert_patient(&new_patient).await.unwrap();
        for signal in default_catalog() {
            for i in 0..144_i64 {
                store
                    .upsert_measurement(&Measurement {
                        patient_id: stored.id,
                        signal_id: signal.id,
                        time: new_patient.datetime_admission + Duration::minutes(i * 10),
                        value: signal.population_mean,
                    })
                    .await
                    .unwrap();
            }
        }
        stored.id
    });
    let engine = PredictionEngine::new(&Stores::from_backend(store));

    c.bench_function("prediction/engine_in_memory", |b| {
        b.iter(|| black_box(runtime.block_on(engine.predict(id)).unwrap()));
    });
}

criterion_group!(prediction, bench_aggregate_and_score, bench_engine_in_memory);
criterion_main!(prediction);
