//! Route handlers.
//!
//! Every successful response is wrapped as `{"data": ..., "links": {"self": uri}}`.

use axum::{
    extract::{rejection::PathRejection, OriginalUri, Path, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::IcuError;
use crate::patient::{Patient, PatientId};

use super::error::ApiError;
use super::AppState;

/// Links block of an envelope.
#[derive(Debug, Serialize)]
pub struct Links {
    /// Request URI, serialized as `self`.
    #[serde(rename = "self")]
    pub self_link: String,
}

/// Success response wrapper.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Payload.
    pub data: T,
    /// Links back to the request.
    pub links: Links,
}

impl<T> Envelope<T> {
    fn new(data: T, uri: &axum::http::Uri) -> Json<Self> {
        Json(Self {
            data,
            links: Links {
                self_link: uri.to_string(),
            },
        })
    }
}

/// Payload of `/get_prediction_for_single_patient`.
#[derive(Debug, Serialize)]
pub struct PatientPrediction {
    /// Scored patient.
    pub patient: Patient,
    /// Model output in `[0, 1]`.
    pub risk_probability: f64,
}

/// Payload of `/get_current_simulated_time`.
#[derive(Debug, Serialize)]
pub struct SimulatedTime {
    /// Latest measurement time.
    pub current_simulated_time: Option<NaiveDateTime>,
}

/// Patients without a discharge time.
///
/// # Errors
///
/// Store failures, mapped through [`ApiError`].
pub async fn get_patients_in_ic(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Envelope<Vec<Patient>>>, ApiError> {
    let patients = state
        .stores
        .patients
        .list_in_unit()
        .await
        .map_err(IcuError::from)?;
    Ok(Envelope::new(patients, &uri))
}

/// Risk prediction for one patient.
///
/// # Errors
///
/// 400 for a non-integer id, 404 for an unknown patient, 422 when a model
/// input signal has no measurements.
pub async fn get_prediction_for_single_patient(
    State(state): State<AppState>,
    patient_id: Result<Path<i64>, PathRejection>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Envelope<PatientPrediction>>, ApiError> {
    let Path(patient_id) = patient_id?;
    let prediction = state.engine.predict(PatientId::new(patient_id)).await?;
    Ok(Envelope::new(
        PatientPrediction {
            patient: prediction.patient,
            risk_probability: prediction.risk_probability,
        },
        &uri,
    ))
}

/// Latest measurement time, `null` before the first measurement.
///
/// # Errors
///
/// Store failures, mapped through [`ApiError`].
pub async fn get_current_simulated_time(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Envelope<SimulatedTime>>, ApiError> {
    let current_simulated_time = state
        .stores
        .measurements
        .latest_time()
        .await
        .map_err(IcuError::from)?;
    Ok(Envelope::new(
        SimulatedTime {
            current_simulated_time,
        },
        &uri,
    ))
}
