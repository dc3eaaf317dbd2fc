//! Simulation driver.
//!
//! Owns the clock, the bed pool and the RNG and runs the per-minute loop:
//! discharge decision, sampling pass, admission decision, clock advance,
//! wall-clock pause.

use std::fmt;

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::IcuResult;
use crate::patient::{Patient, PatientId};
use crate::storage::Stores;

use super::beds::BedPool;
use super::clock::SimulationClock;
use super::config::SimulationConfig;
use super::controller::AdmissionController;
use super::identity::{IdentitySource, NameBook};
use super::sampler::SignalSampler;

/// Identifier attached to every log line of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of a single simulated minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Simulated time the step ran at.
    pub time: NaiveDateTime,
    /// Patient discharged this step, if any.
    pub discharged: Option<PatientId>,
    /// Measurements written this step.
    pub measurements: usize,
    /// Patient admitted this step, if any.
    pub admitted: Option<PatientId>,
}

/// Totals for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run the totals belong to.
    pub run_id: RunId,
    /// Steps taken since the last reset.
    pub steps: u64,
    /// Includes the forced admissions of initialization.
    pub admissions: u64,
    /// Discharges since the last reset.
    pub discharges: u64,
    /// Measurements written since the last reset.
    pub measurements: u64,
    /// Simulated time after the last step.
    pub simulated_until: NaiveDateTime,
}

/// Patient-flow simulator over a set of stores.
pub struct Simulator {
    run_id: RunId,
    config: SimulationConfig,
    stores: Stores,
    clock: SimulationClock,
    beds: BedPool,
    controller: AdmissionController,
    sampler: SignalSampler,
    rng: StdRng,
    steps: u64,
    admissions: u64,
    discharges: u64,
    measurements: u64,
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("run_id", &self.run_id)
            .field("now", &self.clock.now())
            .field("in_unit", &self.controller.in_unit().len())
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Creates a simulator with Dutch synthetic identities.
    ///
    /// The signal catalog is read from `stores.signals` once.
    ///
    /// # Errors
    ///
    /// Same as [`Simulator::with_identities`].
    pub async fn new(config: SimulationConfig, stores: Stores) -> IcuResult<Self> {
        let identities = NameBook::new(config.min_age, config.max_age);
        Self::with_identities(config, stores, Box::new(identities)).await
    }

    /// Creates a simulator with a custom identity source.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`SimulationConfig::validate`], store
    /// errors while loading the catalog, and `InvalidSignalDistribution`.
    pub async fn with_identities(
        config: SimulationConfig,
        stores: Stores,
        identities: Box<dyn IdentitySource>,
    ) -> IcuResult<Self> {
        config.validate()?;
        let signals = stores.signals.list_signals().await?;
        let sampler = SignalSampler::new(signals, config.measurement_probability())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            run_id: RunId::new(),
            clock: SimulationClock::new(config.start, config.step),
            beds: config.bed_pool(),
            controller: AdmissionController::new(config.clone(), identities),
            config,
            stores,
            sampler,
            rng,
            steps: 0,
            admissions: 0,
            discharges: 0,
            measurements: 0,
        })
    }

    /// Id attached to this run's logs.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Settings the simulator was built with.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Bed pool state.
    #[must_use]
    pub fn beds(&self) -> &BedPool {
        &self.beds
    }

    /// Patients currently admitted.
    #[must_use]
    pub fn in_unit(&self) -> &[Patient] {
        self.controller.in_unit()
    }

    /// Clears prior patients and measurements from the store and resets the
    /// clock, the bed pool and the in-unit set.
    ///
    /// # Errors
    ///
    /// Store errors from clearing either table.
    pub async fn reset(&mut self) -> IcuResult<()> {
        // Measurements reference patients, so they go first.
        self.stores.measurements.clear_measurements().await?;
        self.stores.patients.clear_patients().await?;

        self.controller.clear();
        self.beds = self.config.bed_pool();
        self.clock = SimulationClock::new(self.config.start, self.config.step);
        self.steps = 0;
        self.admissions = 0;
        self.discharges = 0;
        self.measurements = 0;
        debug!(run_id = %self.run_id, "simulation state reset");
        Ok(())
    }

    /// Forces `target_average_occupancy` admissions. Returns the number admitted.
    ///
    /// # Errors
    ///
    /// `NoFreeBed` if the pool runs out, or a store error on insert.
    pub async fn populate(&mut self) -> IcuResult<usize> {
        let mut admitted = 0;
        for _ in 0..self.config.target_average_occupancy {
            let id = self
                .controller
                .possibly_admit(
                    &mut self.beds,
                    &self.clock,
                    &mut self.rng,
                    self.stores.patients.as_ref(),
                    true,
                )
                .await?;
            if id.is_some() {
                admitted += 1;
            }
        }
        self.admissions += admitted as u64;
        Ok(admitted)
    }

    /// Reset followed by populate.
    ///
    /// # Errors
    ///
    /// Errors from [`Simulator::reset`] and [`Simulator::populate`].
    pub async fn initialize(&mut self) -> IcuResult<usize> {
        self.reset().await?;
        let admitted = self.populate().await?;
        info!(
            run_id = %self.run_id,
            admitted,
            beds = self.beds.capacity(),
            start = %self.clock.now(),
            "unit populated"
        );
        Ok(admitted)
    }

    /// Runs one simulated minute.
    ///
    /// # Errors
    ///
    /// Store errors and invariant violations from the discharge, sampling
    /// and admission passes. The clock is not advanced on error.
    pub async fn step(&mut self) -> IcuResult<StepReport> {
        let time = self.clock.now();

        let discharged = self
            .controller
            .possibly_discharge(
                &mut self.beds,
                &self.clock,
                &mut self.rng,
                self.stores.patients.as_ref(),
            )
            .await?;
        let measurements = self
            .sampler
            .sample(
                self.controller.in_unit(),
                time,
                &mut self.rng,
                self.stores.measurements.as_ref(),
            )
            .await?;
        let admitted = self
            .controller
            .possibly_admit(
                &mut self.beds,
                &self.clock,
                &mut self.rng,
                self.stores.patients.as_ref(),
                false,
            )
            .await?;
        self.clock.advance();

        self.steps += 1;
        self.admissions += u64::from(admitted.is_some());
        self.discharges += u64::from(discharged.is_some());
        self.measurements += measurements as u64;
        debug!(
            time = %time,
            in_unit = self.controller.in_unit().len(),
            free_beds = self.beds.free_count(),
            measurements,
            "tick"
        );

        Ok(StepReport {
            time,
            discharged,
            measurements,
            admitted,
        })
    }

    /// Runs `steps` minutes back to back, without pacing.
    ///
    /// # Errors
    ///
    /// The first error from [`Simulator::step`].
    pub async fn run_for(&mut self, steps: u64) -> IcuResult<()> {
        for _ in 0..steps {
            self.step().await?;
        }
        Ok(())
    }

    /// Initializes the unit, then steps until `shutdown` turns true or its
    /// sender is dropped.
    ///
    /// With a zero pace the task yields after every step so other tasks on
    /// the same runtime, including the shutdown sender, keep running.
    ///
    /// # Errors
    ///
    /// Any initialization or step error aborts the run.
    #[instrument(skip_all, fields(run_id = %self.run_id))]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> IcuResult<RunSummary> {
        self.initialize().await?;
        info!(pace = ?self.config.pace, "simulation started");

        loop {
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }
            self.step().await?;

            if self.config.pace.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    () = tokio::time::sleep(self.config.pace) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        let summary = self.summary();
        info!(
            steps = summary.steps,
            admissions = summary.admissions,
            discharges = summary.discharges,
            measurements = summary.measurements,
            simulated_until = %summary.simulated_until,
            "simulation stopped"
        );
        Ok(summary)
    }

    /// Totals since the last reset.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            steps: self.steps,
            admissions: self.admissions,
            discharges: self.discharges,
            measurements: self.measurements,
            simulated_until: self.clock.now(),
        }
    }
}
