//! Testing utilities for code that drives a [`Migrator`](crate::Migrator).
//!
//! [`SpyDatabase`] is an in-memory [`Database`] that records every statement it is asked to
//! execute and keeps its ledger in a `Vec`, so tests can count executions and ledger writes
//! without a real engine.
//!
//! ```
//! use shiftsql::testing::SpyDatabase;
//! use shiftsql::Ledger;
//!
//! let mut db = SpyDatabase::new();
//! let ledger = Ledger::default();
//! ledger.ensure_schema(&mut db).unwrap();
//! assert!(!ledger.exists(&mut db, "create_users").unwrap());
//! ```

use crate::core::{Database, LedgerRecord};
use crate::error::Error;
use chrono::{DateTime, Utc};

/// A [`Database`] that remembers what was done to it.
#[derive(Debug, Default)]
pub struct SpyDatabase {
    executed: Vec<String>,
    ledger: Option<Vec<LedgerRecord>>,
    ledger_writes: usize,
    fail_on: Option<String>,
}

impl SpyDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make [`Database::execute`] fail for any statement containing `fragment`.
    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Number of rows inserted into the ledger.
    pub fn ledger_writes(&self) -> usize {
        self.ledger_writes
    }

    /// Whether the ledger table has been created.
    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }

    fn table(&mut self, table: &str) -> Result<&mut Vec<LedgerRecord>, Error> {
        self.ledger
            .as_mut()
            .ok_or_else(|| Error::Generic(format!("no such table: {}", table)))
    }
}

impl Database for SpyDatabase {
    fn execute(&mut self, statement: &str) -> Result<(), Error> {
        if let Some(fragment) = &self.fail_on {
            if statement.contains(fragment.as_str()) {
                return Err(Error::Generic(format!("syntax error near '{}'", fragment)));
            }
        }
        self.executed.push(statement.to_string());
        Ok(())
    }

    fn ensure_ledger(&mut self, _table: &str) -> Result<(), Error> {
        self.ledger.get_or_insert_with(Vec::new);
        Ok(())
    }

    fn ledger_contains(&mut self, table: &str, description: &str) -> Result<bool, Error> {
        Ok(self
            .table(table)?
            .iter()
            .any(|record| record.description == description))
    }

    fn ledger_insert(
        &mut self,
        table: &str,
        description: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let records = self.table(table)?;
        let id = records.len() as i64 + 1;
        records.push(LedgerRecord {
            id,
            description: description.to_string(),
            created_at: applied_at,
        });
        self.ledger_writes += 1;
        Ok(())
    }

    fn ledger_records(&mut self, table: &str) -> Result<Vec<LedgerRecord>, Error> {
        Ok(self.table(table)?.clone())
    }
}
