use crate::error::Error;
use chrono::{DateTime, Utc};
use std::fmt;

/// Default name of the ledger table.
pub const DEFAULT_LEDGER_TABLE_NAME: &str = "migrations";

/// Which way a migration file moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Filename suffix of migration files in this direction, e.g. `.up.sql`.
    pub fn suffix(self) -> &'static str {
        match self {
            Direction::Up => ".up.sql",
            Direction::Down => ".down.sql",
        }
    }

    /// Marker that ends the description part of a filename.
    pub fn terminator(self) -> &'static str {
        match self {
            Direction::Up => ".up",
            Direction::Down => ".down",
        }
    }

    /// Name of the sub-directory of the migrations directory holding these files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A row of the ledger table.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    /// Surrogate key assigned by the database.
    pub id: i64,
    /// Description parsed from the migration filename.
    pub description: String,
    /// Timestamp parsed from the migration filename.
    pub created_at: DateTime<Utc>,
}

/// A report of actions performed during a migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub direction: Direction,
    /// Descriptions of the files that were executed and recorded, in order.
    pub applied: Vec<String>,
    /// Descriptions of the files skipped because the ledger already had them.
    pub skipped: Vec<String>,
    pub statements_executed: usize,
}

impl MigrationReport {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            applied: Vec::new(),
            skipped: Vec::new(),
            statements_executed: 0,
        }
    }
}

/// The database capability the migrator needs.
///
/// Ledger methods receive the table name already validated as a plain identifier,
/// so implementations may interpolate it into their SQL.
pub trait Database {
    /// Execute a single statement, discarding any rows it produces.
    fn execute(&mut self, statement: &str) -> Result<(), Error>;

    /// Create the ledger table if it does not exist yet.
    fn ensure_ledger(&mut self, table: &str) -> Result<(), Error>;

    /// Whether any ledger row carries `description`.
    fn ledger_contains(&mut self, table: &str, description: &str) -> Result<bool, Error>;

    /// Insert one ledger row.
    fn ledger_insert(
        &mut self,
        table: &str,
        description: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// All ledger rows ordered by id.
    fn ledger_records(&mut self, table: &str) -> Result<Vec<LedgerRecord>, Error>;
}

impl<D: Database + ?Sized> Database for Box<D> {
    fn execute(&mut self, statement: &str) -> Result<(), Error> {
        (**self).execute(statement)
    }

    fn ensure_ledger(&mut self, table: &str) -> Result<(), Error> {
        (**self).ensure_ledger(table)
    }

    fn ledger_contains(&mut self, table: &str, description: &str) -> Result<bool, Error> {
        (**self).ledger_contains(table, description)
    }

    fn ledger_insert(
        &mut self,
        table: &str,
        description: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        (**self).ledger_insert(table, description, applied_at)
    }

    fn ledger_records(&mut self, table: &str) -> Result<Vec<LedgerRecord>, Error> {
        (**self).ledger_records(table)
    }
}

/// Format used for ledger timestamps stored as text.
pub(crate) const LEDGER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[allow(dead_code)]
pub(crate) fn parse_ledger_timestamp(value: &str) -> Result<DateTime<Utc>, Error> {
    chrono::NaiveDateTime::parse_from_str(value, LEDGER_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Generic(format!("Failed to parse ledger timestamp '{}': {}", value, e)))
}
