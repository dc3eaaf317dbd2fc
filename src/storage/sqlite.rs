//! SQLite storage backend.
//!
//! Tables:
//! - `signals(id, name, population_mean, population_std)`
//! - `patients(id, first_name, last_name, date_of_birth, age, bed, datetime_admission, datetime_discharge)`
//! - `patient_signal_values(patient_id, signal_id, time, value)`, keyed by
//!   `(patient_id, signal_id, time)`
//!
//! Timestamps are naive simulated times stored as ISO-8601 text, so text
//! ordering matches chronological ordering.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};

use crate::patient::{NewPatient, Patient, PatientId};
use crate::signal::{Measurement, Signal, SignalId, SignalRecord};
use crate::simulation::Bed;
use crate::storage::traits::{MeasurementStore, PatientStore, SignalStore, StorageError};

const MAX_CONNECTIONS: u32 = 5;

/// SQLITE_BUSY / SQLITE_LOCKED: another connection holds the database.
const TRANSIENT_SQLITE_CODES: [&str; 2] = ["5", "6"];

fn map_sqlx_err(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StorageError::Unavailable(err.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => StorageError::Interrupted(err.to_string()),
        sqlx::Error::Database(ref db)
            if db
                .code()
                .is_some_and(|code| TRANSIENT_SQLITE_CODES.contains(&code.as_ref())) =>
        {
            StorageError::Unavailable(db.message().to_string())
        }
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StorageError::DuplicateKey(db.message().to_string())
        }
        other => StorageError::Backend(other.to_string()),
    }
}

#[derive(Debug, FromRow)]
struct SignalRow {
    id: i64,
    name: String,
    population_mean: f64,
    population_std: f64,
}

impl From<SignalRow> for Signal {
    fn from(row: SignalRow) -> Self {
        Self {
            id: SignalId::new(row.id),
            name: row.name,
            population_mean: row.population_mean,
            population_std: row.population_std,
        }
    }
}

#[derive(Debug, FromRow)]
struct PatientRow {
    id: i64,
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    age: i64,
    bed: String,
    datetime_admission: NaiveDateTime,
    datetime_discharge: Option<NaiveDateTime>,
}

impl TryFrom<PatientRow> for Patient {
    type Error = StorageError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let age = u32::try_from(row.age).map_err(|_| {
            StorageError::CorruptRow(format!("patients.id={} has age {}", row.id, row.age))
        })?;
        Ok(Self {
            id: PatientId::new(row.id),
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            age,
            bed: Bed::new(row.bed),
            datetime_admission: row.datetime_admission,
            datetime_discharge: row.datetime_discharge,
        })
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    name: String,
    time: NaiveDateTime,
    value: f64,
}

/// Pooled SQLite store. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open a connection pool, creating the database file if missing.
    ///
    /// `url` uses the `sqlite:` scheme, e.g. `sqlite:icu.db`.
    ///
    /// # Errors
    ///
    /// `Backend` for a malformed URL, `Unavailable` or `Interrupted` when
    /// the database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Backend(format!("invalid database url '{url}': {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(map_sqlx_err)?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create the tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Any failed DDL statement.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                population_mean REAL NOT NULL,
                population_std REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patients (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                age INTEGER NOT NULL,
                bed TEXT NOT NULL,
                datetime_admission TEXT NOT NULL,
                datetime_discharge TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patient_signal_values (
                patient_id INTEGER NOT NULL REFERENCES patients(id),
                signal_id INTEGER NOT NULL REFERENCES signals(id),
                time TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (patient_id, signal_id, time)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_patients_discharge ON patients(datetime_discharge)")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        tracing::info!("database migrations complete");
        Ok(())
    }

    /// Insert `signals` when the catalog is empty. Returns how many were inserted.
    ///
    /// # Errors
    ///
    /// Store errors from counting or inserting.
    pub async fn seed_catalog(&self, signals: &[Signal]) -> Result<usize, StorageError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        if existing > 0 {
            return Ok(0);
        }

        for signal in signals {
            self.insert_signal(signal).await?;
        }
        tracing::info!(count = signals.len(), "seeded signal catalog");
        Ok(signals.len())
    }
}

#[async_trait]
impl SignalStore for SqliteStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, StorageError> {
        let rows = sqlx::query_as::<_, SignalRow>(
            "SELECT id, name, population_mean, population_std FROM signals ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(Signal::from).collect())
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO signals (id, name, population_mean, population_std) VALUES (?, ?, ?, ?)",
        )
        .bind(signal.id.get())
        .bind(&signal.name)
        .bind(signal.population_mean)
        .bind(signal.population_std)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl PatientStore for SqliteStore {
    async fn insert_patient(&self, patient: &NewPatient) -> Result<Patient, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO patients (first_name, last_name, date_of_birth, age, bed, datetime_admission, datetime_discharge)
            VALUES (?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.date_of_birth)
        .bind(i64::from(patient.age))
        .bind(patient.bed.as_str())
        .bind(patient.datetime_admission)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(patient.clone().with_id(PatientId::new(result.last_insert_rowid())))
    }

    async fn upsert_patient(&self, patient: &Patient) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO patients (id, first_name, last_name, date_of_birth, age, bed, datetime_admission, datetime_discharge)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                date_of_birth = excluded.date_of_birth,
                age = excluded.age,
                bed = excluded.bed,
                datetime_admission = excluded.datetime_admission,
                datetime_discharge = excluded.datetime_discharge
            "#,
        )
        .bind(patient.id.get())
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.date_of_birth)
        .bind(i64::from(patient.age))
        .bind(patient.bed.as_str())
        .bind(patient.datetime_admission)
        .bind(patient.datetime_discharge)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn get_patient(&self, id: PatientId) -> Result<Option<Patient>, StorageError> {
        let row = sqlx::query_as::<_, PatientRow>("SELECT * FROM patients WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        row.map(Patient::try_from).transpose()
    }

    async fn list_in_unit(&self) -> Result<Vec<Patient>, StorageError> {
        let rows = sqlx::query_as::<_, PatientRow>(
            "SELECT * FROM patients WHERE datetime_discharge IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        rows.into_iter().map(Patient::try_from).collect()
    }

    async fn clear_patients(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM patients")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl MeasurementStore for SqliteStore {
    async fn upsert_measurement(&self, measurement: &Measurement) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO patient_signal_values (patient_id, signal_id, time, value)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(patient_id, signal_id, time) DO UPDATE SET
                value = excluded.value
            "#,
        )
        .bind(measurement.patient_id.get())
        .bind(measurement.signal_id.get())
        .bind(measurement.time)
        .bind(measurement.value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn find_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<SignalRecord>, StorageError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT s.name, psv.time, psv.value
            FROM patient_signal_values psv
            INNER JOIN signals s
                ON psv.signal_id = s.id
            WHERE psv.patient_id = ?
            ORDER BY psv.time, s.name
            "#,
        )
        .bind(patient_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(rows
            .into_iter()
            .map(|row| SignalRecord {
                name: row.name,
                time: row.time,
                value: row.value,
            })
            .collect())
    }

    async fn latest_time(&self) -> Result<Option<NaiveDateTime>, StorageError> {
        sqlx::query_scalar::<_, Option<NaiveDateTime>>("SELECT MAX(time) FROM patient_signal_values")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    async fn clear_measurements(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM patient_signal_values")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}
