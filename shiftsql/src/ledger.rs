use crate::core::{Database, LedgerRecord, DEFAULT_LEDGER_TABLE_NAME};
use crate::error::Error;
use chrono::{DateTime, Utc};

/// The bookkeeping table recording which migrations have been applied.
///
/// A migration is identified by its description only: two files with the same
/// description are the same migration as far as the ledger is concerned.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE_NAME.to_string(),
        }
    }
}

impl Ledger {
    /// Create a ledger stored in `table`.
    /// The name is interpolated into SQL, so it must be a plain identifier.
    pub fn new(table: impl Into<String>) -> Result<Self, Error> {
        let table = table.into();
        let mut chars = table.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::InvalidTableName(table));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it is absent. Safe to call repeatedly.
    pub fn ensure_schema<D: Database + ?Sized>(&self, db: &mut D) -> Result<(), Error> {
        db.ensure_ledger(&self.table)
            .map_err(|e| Error::Schema(e.to_string()))
    }

    /// Whether a migration with this description has been recorded.
    pub fn exists<D: Database + ?Sized>(&self, db: &mut D, description: &str) -> Result<bool, Error> {
        db.ledger_contains(&self.table, description)
    }

    /// Record a migration as applied.
    pub fn record<D: Database + ?Sized>(
        &self,
        db: &mut D,
        description: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        db.ledger_insert(&self.table, description, applied_at)
            .map_err(|e| Error::LedgerWrite(e.to_string()))
    }

    /// All recorded migrations in insertion order.
    pub fn list<D: Database + ?Sized>(&self, db: &mut D) -> Result<Vec<LedgerRecord>, Error> {
        db.ledger_records(&self.table)
    }
}
