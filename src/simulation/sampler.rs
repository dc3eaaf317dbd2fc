//! Vital sign sampling.

use chrono::NaiveDateTime;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::trace;

use crate::error::{IcuResult, InvariantViolation};
use crate::patient::Patient;
use crate::signal::{Measurement, Signal};
use crate::storage::MeasurementStore;

use super::decide;

/// Draws measurements for every in-unit patient and catalog signal.
#[derive(Debug, Clone)]
pub struct SignalSampler {
    probability: f64,
    distributions: Vec<(Signal, Normal<f64>)>,
}

impl SignalSampler {
    /// Builds a sampler for `signals` measured with per-step `probability`.
    ///
    /// # Errors
    ///
    /// `InvalidSignalDistribution` if a mean is not finite or a standard
    /// deviation is negative or not finite.
    pub fn new(signals: Vec<Signal>, probability: f64) -> Result<Self, InvariantViolation> {
        let distributions = signals
            .into_iter()
            .map(|signal| {
                let invalid = || InvariantViolation::InvalidSignalDistribution {
                    signal: signal.name.clone(),
                    mean: signal.population_mean,
                    std: signal.population_std,
                };
                if !signal.population_mean.is_finite()
                    || !signal.population_std.is_finite()
                    || signal.population_std < 0.0
                {
                    return Err(invalid());
                }
                let normal = Normal::new(signal.population_mean, signal.population_std)
                    .map_err(|_| invalid())?;
                Ok((signal, normal))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            probability,
            distributions,
        })
    }

    /// Per-step probability of each (patient, signal) measurement.
    #[must_use]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Signals sampled, in catalog order.
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.distributions.iter().map(|(signal, _)| signal)
    }

    /// One sampling pass at `now`. Returns the number of measurements written.
    ///
    /// # Errors
    ///
    /// The first store error; earlier writes of the pass are kept.
    pub async fn sample<R: Rng>(
        &self,
        patients: &[Patient],
        now: NaiveDateTime,
        rng: &mut R,
        store: &dyn MeasurementStore,
    ) -> IcuResult<usize> {
        let mut written = 0;
        for patient in patients {
            for (signal, normal) in &self.distributions {
                if !decide(rng, self.probability) {
                    continue;
                }
                let measurement = Measurement {
                    patient_id: patient.id,
                    signal_id: signal.id,
                    time: now,
                    value: normal.sample(rng),
                };
                store.upsert_measurement(&measurement).await?;
                trace!(
                    patient_id = %patient.id,
                    signal = %signal.name,
                    value = measurement.value,
                    "measurement recorded"
                );
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::signal::default_catalog;

    #[test]
    fn rejects_negative_and_non_finite_std() {
        for std in [-1.0, f64::NAN, f64::INFINITY] {
            let err = SignalSampler::new(vec![Signal::new(1, "heart_rate", 80.0, std)], 0.1)
                .unwrap_err();
            assert!(matches!(
                err,
                InvariantViolation::InvalidSignalDistribution { ref signal, .. } if signal == "heart_rate"
            ));
        }
    }

    #[test]
    fn rejects_non_finite_mean() {
        assert!(SignalSampler::new(vec![Signal::new(1, "x", f64::NAN, 1.0)], 0.1).is_err());
    }

    #[test]
    fn zero_std_is_a_point_mass() {
        let sampler = SignalSampler::new(vec![Signal::new(1, "flat", 5.0, 0.0)], 1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let (_, normal) = &sampler.distributions[0];
        assert_eq!(normal.sample(&mut rng), 5.0);
    }

    #[test]
    fn keeps_catalog_order() {
        let sampler = SignalSampler::new(default_catalog(), 0.1).unwrap();
        let names: Vec<_> = sampler.signals().map(|s| s.name.as_str()).collect();
        let expected: Vec<_> = default_catalog().into_iter().map(|s| s.name).collect();
        assert_eq!(names, expected);
    }
}
