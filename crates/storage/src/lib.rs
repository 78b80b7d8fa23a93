use std::{borrow::Cow, str::FromStr, time::Duration};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Row, Sqlite, SqlitePool, Transaction,
};
use thiserror::Error;

use tms_portal_core::money::{self, AmountError};
use tms_portal_core::types::{
    Donation, Program, DONOR_NAME_MAX_LEN, PROGRAM_CATEGORY_MAX_LEN, PROGRAM_NAME_MAX_LEN,
};

pub mod seed;

pub use seed::{seed_demo_data, SeedError, SeedReport};

/// SQLite extended result code for a violated foreign key.
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// The database file is created when missing. Foreign keys are enabled on
    /// every pooled connection so donation cascades always apply.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Begins a SQLite transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Returns a handle for interacting with programs.
    pub fn programs(&self) -> ProgramRepository {
        ProgramRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for interacting with donations.
    pub fn donations(&self) -> DonationRepository {
        DonationRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the `programs` table.
#[derive(Clone)]
pub struct ProgramRepository {
    pool: SqlitePool,
}

impl ProgramRepository {
    /// Inserts a program and returns it with its assigned id.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        program: &NewProgram<'_>,
    ) -> Result<Program, ProgramError> {
        check_length("name", &program.name, PROGRAM_NAME_MAX_LEN)
            .map_err(ProgramError::FieldTooLong)?;
        check_length("category", &program.category, PROGRAM_CATEGORY_MAX_LEN)
            .map_err(ProgramError::FieldTooLong)?;

        let row = sqlx::query(
            "INSERT INTO programs (name, category, description, is_active, start_date) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(program.name.as_ref())
        .bind(program.category.as_ref())
        .bind(program.description.as_ref())
        .bind(program.is_active)
        .bind(program.start_date)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Program {
            id: row.get("id"),
            name: program.name.to_string(),
            category: program.category.to_string(),
            description: program.description.to_string(),
            is_active: program.is_active,
            start_date: program.start_date,
        })
    }

    /// Loads a single program by id.
    pub async fn fetch(&self, id: i64) -> Result<Program, ProgramError> {
        let row = sqlx::query_as::<_, ProgramRow>(
            "SELECT id, name, category, description, is_active, start_date \
             FROM programs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ProgramError::NotFound)?;

        Ok(row.into_domain())
    }

    /// Lists every program ordered by id.
    pub async fn list(&self) -> Result<Vec<Program>, ProgramError> {
        let rows = sqlx::query_as::<_, ProgramRow>(
            "SELECT id, name, category, description, is_active, start_date \
             FROM programs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProgramRow::into_domain).collect())
    }

    /// Counts programs flagged as active.
    pub async fn count_active(&self) -> Result<u64, ProgramError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM programs WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Deletes a program together with its donations. Returns `false` when no row matched.
    pub async fn delete(&self, id: i64) -> Result<bool, ProgramError> {
        let result = sqlx::query("DELETE FROM programs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes every program, returning the number of rows deleted.
    pub async fn delete_all(&self, tx: &mut Transaction<'_, Sqlite>) -> Result<u64, ProgramError> {
        let result = sqlx::query("DELETE FROM programs")
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Data required to create a program.
#[derive(Debug, Clone)]
pub struct NewProgram<'a> {
    pub name: Cow<'a, str>,
    pub category: Cow<'a, str>,
    pub description: Cow<'a, str>,
    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
}

impl<'a> NewProgram<'a> {
    /// An active program with no description and no start date.
    pub fn new(name: impl Into<Cow<'a, str>>, category: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            description: Cow::Borrowed(""),
            is_active: true,
            start_date: None,
        }
    }

    pub fn with_description(self, description: impl Into<Cow<'a, str>>) -> Self {
        Self {
            description: description.into(),
            ..self
        }
    }

    pub fn inactive(self) -> Self {
        Self {
            is_active: false,
            ..self
        }
    }

    pub fn starting_on(self, start_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            ..self
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProgramRow {
    id: i64,
    name: String,
    category: String,
    description: String,
    is_active: bool,
    start_date: Option<NaiveDate>,
}

impl ProgramRow {
    fn into_domain(self) -> Program {
        Program {
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description,
            is_active: self.is_active,
            start_date: self.start_date,
        }
    }
}

/// Errors that can occur while reading or writing programs.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("program not found")]
    NotFound,
    #[error("{0}")]
    FieldTooLong(FieldTooLong),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A text value exceeded its column limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} must be at most {max} characters")]
pub struct FieldTooLong {
    pub field: &'static str,
    pub max: usize,
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), FieldTooLong> {
    if value.chars().count() > max {
        return Err(FieldTooLong { field, max });
    }
    Ok(())
}

/// Repository for the `donations` table.
#[derive(Clone)]
pub struct DonationRepository {
    pool: SqlitePool,
}

impl DonationRepository {
    /// Inserts a donation and returns its id.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        donation: &NewDonation<'_>,
    ) -> Result<i64, DonationError> {
        let amount_cents = money::to_minor_units(donation.amount)?;
        check_length("donor_name", &donation.donor_name, DONOR_NAME_MAX_LEN)
            .map_err(DonationError::FieldTooLong)?;

        let result = sqlx::query(
            "INSERT INTO donations (program_id, amount_cents, donor_name, created_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(donation.program_id)
        .bind(amount_cents)
        .bind(donation.donor_name.as_ref())
        .bind(to_rfc3339(donation.created_at))
        .fetch_one(&mut **tx)
        .await;

        match result {
            Ok(row) => Ok(row.get("id")),
            Err(sqlx::Error::Database(db_err)) => {
                if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY) {
                    return Err(DonationError::MissingProgram(donation.program_id));
                }
                Err(DonationError::Database(sqlx::Error::Database(db_err)))
            }
            Err(err) => Err(DonationError::Database(err)),
        }
    }

    /// Lists every donation with its program, newest first.
    pub async fn list_recent(&self) -> Result<Vec<Donation>, DonationError> {
        let rows = sqlx::query_as::<_, DonationWithProgramRow>(&format!(
            "{DONATION_WITH_PROGRAM_SELECT} ORDER BY d.created_at DESC, d.id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(DonationWithProgramRow::into_domain)
            .collect())
    }

    /// Lists the donations made to one program, newest first.
    pub async fn list_for_program(&self, program_id: i64) -> Result<Vec<Donation>, DonationError> {
        let rows = sqlx::query_as::<_, DonationWithProgramRow>(&format!(
            "{DONATION_WITH_PROGRAM_SELECT} WHERE d.program_id = ? \
             ORDER BY d.created_at DESC, d.id DESC"
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(DonationWithProgramRow::into_domain)
            .collect())
    }

    /// Counts all donations.
    pub async fn count(&self) -> Result<u64, DonationError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM donations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Sums every donation amount; zero when there are none.
    pub async fn total_amount(&self) -> Result<Decimal, DonationError> {
        let cents: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM donations")
            .fetch_one(&self.pool)
            .await?;
        Ok(money::from_minor_units(cents))
    }

    /// Removes every donation, returning the number of rows deleted.
    pub async fn delete_all(&self, tx: &mut Transaction<'_, Sqlite>) -> Result<u64, DonationError> {
        let result = sqlx::query("DELETE FROM donations")
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

const DONATION_WITH_PROGRAM_SELECT: &str = r#"
SELECT d.id,
       d.amount_cents,
       d.donor_name,
       d.created_at,
       p.id AS program_id,
       p.name AS program_name,
       p.category AS program_category,
       p.description AS program_description,
       p.is_active AS program_is_active,
       p.start_date AS program_start_date
  FROM donations AS d
  JOIN programs AS p
    ON p.id = d.program_id
"#;

/// Data required to record a donation.
#[derive(Debug, Clone)]
pub struct NewDonation<'a> {
    pub program_id: i64,
    pub amount: Decimal,
    pub donor_name: Cow<'a, str>,
    pub created_at: DateTime<Utc>,
}

impl<'a> NewDonation<'a> {
    /// A donation stamped with the current time.
    pub fn new(program_id: i64, amount: Decimal, donor_name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            program_id,
            amount,
            donor_name: donor_name.into(),
            created_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_created_at(self, created_at: DateTime<Utc>) -> Self {
        Self { created_at, ..self }
    }
}

/// Donation row joined with the columns of its program.
#[derive(Debug, sqlx::FromRow)]
struct DonationWithProgramRow {
    id: i64,
    amount_cents: i64,
    donor_name: String,
    created_at: DateTime<Utc>,
    program_id: i64,
    program_name: String,
    program_category: String,
    program_description: String,
    program_is_active: bool,
    program_start_date: Option<NaiveDate>,
}

impl DonationWithProgramRow {
    fn into_domain(self) -> Donation {
        Donation {
            id: self.id,
            program: Program {
                id: self.program_id,
                name: self.program_name,
                category: self.program_category,
                description: self.program_description,
                is_active: self.program_is_active,
                start_date: self.program_start_date,
            },
            amount: money::from_minor_units(self.amount_cents),
            donor_name: self.donor_name,
            created_at: self.created_at,
        }
    }
}

/// Errors that can occur while reading or writing donations.
#[derive(Debug, Error)]
pub enum DonationError {
    #[error("program {0} does not exist")]
    MissingProgram(i64),
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("{0}")]
    FieldTooLong(FieldTooLong),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::TempDir;

    pub(crate) async fn setup_db() -> (Database, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("portal.db").display());
        let db = Database::connect(&url).await.expect("connect");
        db.run_migrations().await.expect("migrations");
        (db, dir)
    }

    async fn insert_program(db: &Database, program: NewProgram<'_>) -> Program {
        let mut tx = db.begin().await.expect("begin");
        let program = db
            .programs()
            .insert(&mut tx, &program)
            .await
            .expect("insert program");
        tx.commit().await.expect("commit");
        program
    }

    async fn insert_donation(db: &Database, donation: NewDonation<'_>) -> i64 {
        let mut tx = db.begin().await.expect("begin");
        let id = db
            .donations()
            .insert(&mut tx, &donation)
            .await
            .expect("insert donation");
        tx.commit().await.expect("commit");
        id
    }

    fn cents(value: i64) -> Decimal {
        money::from_minor_units(value)
    }

    #[tokio::test]
    async fn migrations_apply() {
        let (db, _dir) = setup_db().await;

        let tables: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('programs', 'donations')",
        )
        .fetch_one(db.pool())
        .await
        .expect("fetch tables");
        assert_eq!(tables.0, 2);
    }

    #[tokio::test]
    async fn program_defaults_round_trip_through_fetch() {
        let (db, _dir) = setup_db().await;
        let inserted = insert_program(&db, NewProgram::new("Education for All", "Education")).await;

        let fetched = db.programs().fetch(inserted.id).await.expect("fetch");
        assert_eq!(fetched, inserted);
        assert!(fetched.is_active);
        assert_eq!(fetched.description, "");
        assert_eq!(fetched.start_date, None);
    }

    #[tokio::test]
    async fn program_start_date_is_persisted() {
        let (db, _dir) = setup_db().await;
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).expect("valid date");
        let inserted = insert_program(
            &db,
            NewProgram::new("Clean Water Initiative", "Health").starting_on(start),
        )
        .await;

        let fetched = db.programs().fetch(inserted.id).await.expect("fetch");
        assert_eq!(fetched.start_date, Some(start));
    }

    #[tokio::test]
    async fn fetch_errors_for_missing_program() {
        let (db, _dir) = setup_db().await;
        let err = db.programs().fetch(42).await.unwrap_err();
        assert!(matches!(err, ProgramError::NotFound));
    }

    #[tokio::test]
    async fn rejects_overlong_category() {
        let (db, _dir) = setup_db().await;
        let category = "x".repeat(PROGRAM_CATEGORY_MAX_LEN + 1);
        let mut tx = db.begin().await.expect("begin");
        let err = db
            .programs()
            .insert(&mut tx, &NewProgram::new("Too long", category))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProgramError::FieldTooLong(FieldTooLong { field: "category", .. })
        ));
    }

    #[tokio::test]
    async fn count_active_ignores_inactive_programs_and_donations() {
        let (db, _dir) = setup_db().await;
        let active = insert_program(&db, NewProgram::new("Active", "Health")).await;
        insert_program(&db, NewProgram::new("Paused", "Health").inactive()).await;
        insert_program(&db, NewProgram::new("Also active", "Education")).await;
        insert_donation(&db, NewDonation::new(active.id, cents(100), "")).await;

        let count = db.programs().count_active().await.expect("count");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn donation_insert_errors_when_program_missing() {
        let (db, _dir) = setup_db().await;
        let mut tx = db.begin().await.expect("begin");
        let err = db
            .donations()
            .insert(&mut tx, &NewDonation::new(999, cents(500), "Ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, DonationError::MissingProgram(999)));
    }

    #[tokio::test]
    async fn donation_insert_rejects_extra_precision() {
        let (db, _dir) = setup_db().await;
        let program = insert_program(&db, NewProgram::new("Education", "Education")).await;
        let amount = Decimal::new(10_005, 3);

        let mut tx = db.begin().await.expect("begin");
        let err = db
            .donations()
            .insert(&mut tx, &NewDonation::new(program.id, amount, ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DonationError::InvalidAmount(AmountError::TooManyDecimalPlaces(_))
        ));
    }

    #[tokio::test]
    async fn total_amount_is_zero_without_donations() {
        let (db, _dir) = setup_db().await;
        let total = db.donations().total_amount().await.expect("total");
        assert_eq!(total, Decimal::ZERO);
        assert_eq!(db.donations().count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn total_amount_sums_exactly() {
        let (db, _dir) = setup_db().await;
        let program = insert_program(&db, NewProgram::new("Education", "Education")).await;
        for value in [10, 20, 1_999_999, -5] {
            insert_donation(&db, NewDonation::new(program.id, cents(value), "")).await;
        }

        let total = db.donations().total_amount().await.expect("total");
        assert_eq!(total, cents(2_000_024));
        assert_eq!(db.donations().count().await.expect("count"), 4);
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first_for_any_insert_order() {
        let (db, _dir) = setup_db().await;
        let program = insert_program(&db, NewProgram::new("Education", "Education")).await;
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        for offset in [3, 1, 4, 2] {
            let donation = NewDonation::new(program.id, cents(offset * 100), format!("d{offset}"))
                .with_created_at(base + ChronoDuration::minutes(offset));
            insert_donation(&db, donation).await;
        }

        let donations = db.donations().list_recent().await.expect("list");
        let donors: Vec<_> = donations
            .iter()
            .map(|donation| donation.donor_name.as_str())
            .collect();
        assert_eq!(donors, vec!["d4", "d3", "d2", "d1"]);
        assert!(donations
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
        assert_eq!(donations[0].program, program);
        assert_eq!(donations[0].amount, cents(400));
        assert_eq!(donations[0].created_at, base + ChronoDuration::minutes(4));
    }

    #[tokio::test]
    async fn list_recent_breaks_timestamp_ties_by_id() {
        let (db, _dir) = setup_db().await;
        let program = insert_program(&db, NewProgram::new("Education", "Education")).await;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let first = insert_donation(
            &db,
            NewDonation::new(program.id, cents(100), "first").with_created_at(at),
        )
        .await;
        let second = insert_donation(
            &db,
            NewDonation::new(program.id, cents(100), "second").with_created_at(at),
        )
        .await;

        let ids: Vec<_> = db
            .donations()
            .list_recent()
            .await
            .expect("list")
            .into_iter()
            .map(|donation| donation.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn deleting_program_cascades_to_donations() {
        let (db, _dir) = setup_db().await;
        let doomed = insert_program(&db, NewProgram::new("Doomed", "Health")).await;
        let kept = insert_program(&db, NewProgram::new("Kept", "Education")).await;
        insert_donation(&db, NewDonation::new(doomed.id, cents(1_000), "a")).await;
        insert_donation(&db, NewDonation::new(doomed.id, cents(2_000), "b")).await;
        insert_donation(&db, NewDonation::new(kept.id, cents(3_000), "c")).await;

        assert!(db.programs().delete(doomed.id).await.expect("delete"));
        assert!(!db.programs().delete(doomed.id).await.expect("second delete"));

        let remaining = db.donations().list_recent().await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert!(remaining
            .iter()
            .all(|donation| donation.program.id != doomed.id));
        assert!(db
            .donations()
            .list_for_program(doomed.id)
            .await
            .expect("list for program")
            .is_empty());
    }

    #[tokio::test]
    async fn list_for_program_filters_by_program() {
        let (db, _dir) = setup_db().await;
        let water = insert_program(&db, NewProgram::new("Water", "Health")).await;
        let books = insert_program(&db, NewProgram::new("Books", "Education")).await;
        insert_donation(&db, NewDonation::new(water.id, cents(1_000), "a")).await;
        insert_donation(&db, NewDonation::new(books.id, cents(2_000), "b")).await;
        insert_donation(&db, NewDonation::new(water.id, cents(3_000), "c")).await;

        let donations = db
            .donations()
            .list_for_program(water.id)
            .await
            .expect("list for program");
        assert_eq!(donations.len(), 2);
        assert!(donations
            .iter()
            .all(|donation| donation.program.name == "Water"));
    }
}
