//! Admission and discharge decisions.
//!
//! The controller owns the in-unit patient set. Every admitted patient
//! holds exactly one bed from the pool until discharged.

use rand::Rng;
use tracing::info;

use crate::error::{IcuResult, InvariantViolation};
use crate::patient::{age_in_years, NewPatient, Patient, PatientId};
use crate::storage::PatientStore;

use super::beds::BedPool;
use super::clock::SimulationClock;
use super::config::SimulationConfig;
use super::decide;
use super::identity::IdentitySource;

/// Owns the in-unit set and applies the admission/discharge rules.
pub struct AdmissionController {
    config: SimulationConfig,
    identities: Box<dyn IdentitySource>,
    in_unit: Vec<Patient>,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("in_unit", &self.in_unit.len())
            .finish_non_exhaustive()
    }
}

impl AdmissionController {
    /// Controller with an empty unit.
    #[must_use]
    pub fn new(config: SimulationConfig, identities: Box<dyn IdentitySource>) -> Self {
        Self {
            config,
            identities,
            in_unit: Vec::new(),
        }
    }

    /// Patients currently in the unit, in admission order modulo discharges.
    pub fn in_unit(&self) -> &[Patient] {
        &self.in_unit
    }

    /// Per-step admission probability.
    #[must_use]
    pub fn admission_probability(&self) -> f64 {
        self.config.admission_probability()
    }

    /// Per-step discharge probability at the current occupancy.
    #[must_use]
    pub fn discharge_probability(&self) -> f64 {
        self.config.discharge_probability(self.in_unit.len())
    }

    /// Forgets the in-unit set. Beds are not touched.
    pub fn clear(&mut self) {
        self.in_unit.clear();
    }

    /// Admits a patient if the admission trial succeeds and a bed is free,
    /// or unconditionally when `force` is set.
    ///
    /// # Errors
    ///
    /// `NoFreeBed` for a forced admission into a full unit. If the store
    /// rejects the insert, the bed is released before the error is returned.
    pub async fn possibly_admit<R: Rng>(
        &mut self,
        beds: &mut BedPool,
        clock: &SimulationClock,
        rng: &mut R,
        store: &dyn PatientStore,
        force: bool,
    ) -> IcuResult<Option<PatientId>> {
        let admit = decide(rng, self.admission_probability()) && beds.free_count() > 0;
        if !(admit || force) {
            return Ok(None);
        }

        let bed = beds.acquire(rng).ok_or(InvariantViolation::NoFreeBed)?;
        let today = clock.today();
        let identity = self.identities.generate(rng, today);
        let new_patient = NewPatient {
            first_name: identity.first_name,
            last_name: identity.last_name,
            date_of_birth: identity.date_of_birth,
            age: age_in_years(identity.date_of_birth, today),
            bed: bed.clone(),
            datetime_admission: clock.now(),
        };

        let patient = match store.insert_patient(&new_patient).await {
            Ok(patient) => patient,
            Err(err) => {
                beds.release(bed)?;
                return Err(err.into());
            }
        };

        info!(
            patient_id = %patient.id,
            bed = %patient.bed,
            age = patient.age,
            time = %patient.datetime_admission,
            forced = force,
            "patient admitted"
        );
        let id = patient.id;
        self.in_unit.push(patient);
        Ok(Some(id))
    }

    /// Discharges a uniformly chosen in-unit patient if the discharge trial
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Store errors from recording the discharge, or a bed invariant
    /// violation on release.
    pub async fn possibly_discharge<R: Rng>(
        &mut self,
        beds: &mut BedPool,
        clock: &SimulationClock,
        rng: &mut R,
        store: &dyn PatientStore,
    ) -> IcuResult<Option<PatientId>> {
        if !decide(rng, self.discharge_probability()) || self.in_unit.is_empty() {
            return Ok(None);
        }
        let index = rng.gen_range(0..self.in_unit.len());
        self.discharge_at(index, beds, clock, store).await.map(Some)
    }

    /// Discharges a specific patient.
    ///
    /// # Errors
    ///
    /// `PatientNotInUnit` if `id` is not in the in-unit set, which includes
    /// patients that were already discharged.
    pub async fn discharge(
        &mut self,
        id: PatientId,
        beds: &mut BedPool,
        clock: &SimulationClock,
        store: &dyn PatientStore,
    ) -> IcuResult<()> {
        let index = self
            .in_unit
            .iter()
            .position(|p| p.id == id)
            .ok_or(InvariantViolation::PatientNotInUnit { id })?;
        self.discharge_at(index, beds, clock, store).await?;
        Ok(())
    }

    async fn discharge_at(
        &mut self,
        index: usize,
        beds: &mut BedPool,
        clock: &SimulationClock,
        store: &dyn PatientStore,
    ) -> IcuResult<PatientId> {
        let mut patient = self.in_unit[index].clone();
        if patient.datetime_discharge.is_some() {
            return Err(InvariantViolation::AlreadyDischarged { id: patient.id }.into());
        }
        patient.datetime_discharge = Some(clock.now());
        store.upsert_patient(&patient).await?;

        self.in_unit.swap_remove(index);
        beds.release(patient.bed.clone())?;
        info!(
            patient_id = %patient.id,
            bed = %patient.bed,
            time = %clock.now(),
            "patient discharged"
        );
        Ok(patient.id)
    }
}
