//! ICU patient-flow simulation.
//!
//! One [`Simulator`] owns the clock, the bed pool and the RNG; the
//! [`AdmissionController`] owns the in-unit set and the [`SignalSampler`]
//! reads it once per step. All state changes are written through the
//! store handles in [`crate::storage::Stores`].

pub mod beds;
pub mod clock;
pub mod config;
pub mod controller;
pub mod driver;
pub mod identity;
pub mod sampler;

pub use beds::{Bed, BedPool};
pub use clock::SimulationClock;
pub use config::{SimulationConfig, MINUTES_PER_DAY};
pub use controller::AdmissionController;
pub use driver::{RunId, RunSummary, Simulator, StepReport};
pub use identity::{Identity, IdentitySource, NameBook};
pub use sampler::SignalSampler;

use rand::Rng;

/// Bernoulli trial. Probabilities above one always succeed, zero never does.
pub(crate) fn decide<R: Rng>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}
