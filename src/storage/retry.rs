//! Retry with exponential backoff for transient store failures.
//!
//! Only transient errors are retried. Every other error is returned on the
//! first attempt. Patient inserts are not idempotent, so they are replayed
//! only when the failure is known to have had no effect.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::Rng;
use tracing::{debug, warn};

use crate::patient::{NewPatient, Patient, PatientId};
use crate::signal::{Measurement, Signal, SignalRecord};
use crate::storage::traits::{MeasurementStore, PatientStore, SignalStore, StorageError};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Enable/disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            capped + capped * 0.25 * rand::thread_rng().gen::<f64>()
        } else {
            capped
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    attempt_fn: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    retry_when(policy, operation, StorageError::is_transient, attempt_fn).await
}

async fn retry_when<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    retryable: fn(&StorageError) -> bool,
    mut attempt_fn: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if retryable(&err) && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "store unavailable, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if retryable(&err) => {
                return Err(StorageError::Unavailable(format!(
                    "{operation} gave up after {attempt} attempts: {err}"
                )));
            }
            Err(err) => return Err(err),
        }
    }
}

/// Establish a store session, retrying transient failures with backoff.
///
/// # Errors
///
/// [`StorageError::Unavailable`] once `policy.max_attempts` is exhausted.
/// Non-transient errors are returned immediately.
pub async fn connect_with_retry<T, F, Fut>(policy: &RetryPolicy, connect: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let session = retry_transient(policy, "connect", connect).await?;
    debug!("store connection established");
    Ok(session)
}

/// Store adapter that retries transient failures of every call.
///
/// Upserts are keyed, so a replayed write converges on the same row.
/// `insert_patient` assigns a fresh id per call and is retried only on
/// [`StorageError::Unavailable`]; an `Interrupted` insert is returned to the
/// caller, since the row may already exist.
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    /// Wrap `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SignalStore> SignalStore for Retrying<S> {
    async fn list_signals(&self) -> Result<Vec<Signal>, StorageError> {
        retry_transient(&self.policy, "list_signals", || self.inner.list_signals()).await
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), StorageError> {
        retry_transient(&self.policy, "insert_signal", || self.inner.insert_signal(signal)).await
    }
}

#[async_trait]
impl<S: PatientStore> PatientStore for Retrying<S> {
    async fn insert_patient(&self, patient: &NewPatient) -> Result<Patient, StorageError> {
        retry_when(
            &self.policy,
            "insert_patient",
            StorageError::is_unapplied,
            || self.inner.insert_patient(patient),
        )
        .await
    }

    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError> {
        retry_transient(&self.policy, "upsert_patient", || self.inner.upsert_patient(patient)).await
    }

    async fn get_patient(&self, id: PatientId) -> Result<Option<Patient>, StorageError> {
        retry_transient(&self.policy, "get_patient", || self.inner.get_patient(id)).await
    }

    async fn list_in_unit(&self) -> Result<Vec<Patient>, StorageError> {
        retry_transient(&self.policy, "list_in_unit", || self.inner.list_in_unit()).await
    }

    async fn clear_patients(&self) -> Result<(), StorageError> {
        retry_transient(&self.policy, "clear_patients", || self.inner.clear_patients()).await
    }
}

#[async_trait]
impl<S: MeasurementStore> MeasurementStore for Retrying<S> {
    async fn upsert_measurement(&self, measurement: &Measurement) -> Result<(), StorageError> {
        retry_transient(&self.policy, "upsert_measurement", || {
            self.inner.upsert_measurement(measurement)
        })
        .await
    }

    async fn find_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<SignalRecord>, StorageError> {
        retry_transient(&self.policy, "find_for_patient", || {
            self.inner.find_for_patient(patient_id)
        })
        .await
    }

    async fn latest_time(&self) -> Result<Option<NaiveDateTime>, StorageError> {
        retry_transient(&self.policy, "latest_time", || self.inner.latest_time()).await
    }

    async fn clear_measurements(&self) -> Result<(), StorageError> {
        retry_transient(&self.policy, "clear_measurements", || {
            self.inner.clear_measurements()
        })
        .await
    }
}
