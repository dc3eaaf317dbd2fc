//! Synthetic patient identities.

use chrono::{Duration, NaiveDate};
use rand::{Rng, RngCore};

const FIRST_NAMES: &[&str] = &[
    "Daan", "Sem", "Lucas", "Levi", "Finn", "Milan", "Bram", "Thijs", "Jesse", "Ruben", "Emma",
    "Julia", "Sophie", "Tess", "Zoë", "Anna", "Fleur", "Lotte", "Sanne", "Noor", "Femke",
    "Maarten", "Joost", "Willemijn", "Ingrid", "Henk", "Gerrit", "Annelies", "Kees", "Marieke",
];

const LAST_NAMES: &[&str] = &[
    "de Jong", "Jansen", "de Vries", "van den Berg", "van Dijk", "Bakker", "Janssen", "Visser",
    "Smit", "Meijer", "de Boer", "Mulder", "de Groot", "Bos", "Vos", "Peters", "Hendriks",
    "van Leeuwen", "Dekker", "Brouwer", "de Wit", "Dijkstra", "Smits", "de Graaf", "van der Meer",
];

/// Name and birth date of a newly admitted patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
}

/// Source of synthetic identities.
///
/// Randomness is always drawn from the simulation RNG so seeded runs are
/// reproducible.
pub trait IdentitySource: Send {
    /// Produces an identity for a patient admitted on `today`.
    fn generate(&mut self, rng: &mut dyn RngCore, today: NaiveDate) -> Identity;
}

/// Dutch names with birth dates giving an age within `[min_age, max_age]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameBook {
    min_age: u32,
    max_age: u32,
}

impl NameBook {
    /// Creates a name book; the bounds are swapped if given inverted.
    #[must_use]
    pub fn new(min_age: u32, max_age: u32) -> Self {
        Self {
            min_age: min_age.min(max_age),
            max_age: max_age.max(min_age),
        }
    }
}

impl Default for NameBook {
    fn default() -> Self {
        Self::new(10, 100)
    }
}

fn pick<'a>(rng: &mut dyn RngCore, names: &[&'a str]) -> &'a str {
    names[rng.gen_range(0..names.len())]
}

impl IdentitySource for NameBook {
    fn generate(&mut self, rng: &mut dyn RngCore, today: NaiveDate) -> Identity {
        // Ages count 365-day years, so the last day of max_age is 364 days past.
        let min_days = i64::from(self.min_age) * 365;
        let max_days = i64::from(self.max_age) * 365 + 364;
        let days_old = rng.gen_range(min_days..=max_days);
        let date_of_birth = today
            .checked_sub_signed(Duration::days(days_old))
            .unwrap_or(NaiveDate::MIN);

        Identity {
            first_name: pick(rng, FIRST_NAMES).to_string(),
            last_name: pick(rng, LAST_NAMES).to_string(),
            date_of_birth,
        }
    }
}
