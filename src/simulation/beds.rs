//! Bed pool.
//!
//! The pool partitions a fixed set of bed labels into free and occupied.
//! `free_count() + occupied_count() == capacity()` holds after every call.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

/// Physical bed label, e.g. `BED_07`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bed(String);

impl Bed {
    /// Creates a bed label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label for the `n`-th bed (1-based), zero-padded to two digits.
    #[must_use]
    pub fn numbered(n: usize) -> Self {
        Self(format!("BED_{n:02}"))
    }

    /// Returns the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free/occupied partition of a fixed bed set.
#[derive(Debug, Clone)]
pub struct BedPool {
    beds: Vec<Bed>,
    free: Vec<Bed>,
}

impl BedPool {
    /// Creates a pool where every bed is free. Duplicate labels are dropped.
    #[must_use]
    pub fn new(labels: impl IntoIterator<Item = Bed>) -> Self {
        let mut beds: Vec<Bed> = Vec::new();
        for bed in labels {
            if !beds.contains(&bed) {
                beds.push(bed);
            }
        }
        let free = beds.clone();
        Self { beds, free }
    }

    /// Creates `BED_01`..`BED_{count}`.
    #[must_use]
    pub fn numbered(count: usize) -> Self {
        Self::new((1..=count).map(Bed::numbered))
    }

    /// Removes and returns a uniformly chosen free bed.
    pub fn acquire<R: Rng>(&mut self, rng: &mut R) -> Option<Bed> {
        if self.free.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.free.len());
        Some(self.free.swap_remove(idx))
    }

    /// Returns an occupied bed to the free set.
    ///
    /// # Errors
    /// - `UnknownBed`: the label is not part of this pool
    /// - `BedAlreadyFree`: the bed is not occupied
    pub fn release(&mut self, bed: Bed) -> Result<(), InvariantViolation> {
        if !self.beds.contains(&bed) {
            return Err(InvariantViolation::UnknownBed { bed });
        }
        if self.free.contains(&bed) {
            return Err(InvariantViolation::BedAlreadyFree { bed });
        }
        self.free.push(bed);
        Ok(())
    }

    /// Total number of beds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.beds.len()
    }

    /// Beds available for admission.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Beds held by patients.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.beds.len() - self.free.len()
    }

    /// True if `bed` is in the free set.
    #[must_use]
    pub fn is_free(&self, bed: &Bed) -> bool {
        self.free.contains(bed)
    }

    /// Every bed in the pool, in construction order.
    pub fn beds(&self) -> &[Bed] {
        &self.beds
    }

    /// Occupied beds, in construction order.
    pub fn occupied(&self) -> Vec<Bed> {
        self.beds
            .iter()
            .filter(|bed| !self.free.contains(bed))
            .cloned()
            .collect()
    }
}
