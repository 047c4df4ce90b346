//!
//! # SQLite support
//!
//! [`Database`] is implemented directly for [`rusqlite::Connection`].
//!
//! ```
//! use shiftsql::{Migrator, MigratorConfig};
//! use rusqlite::Connection;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::create_dir(dir.path().join("up")).unwrap();
//! std::fs::write(
//!     dir.path().join("up").join("20240101090000_create_users.up.sql"),
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);\n\
//!      INSERT INTO users (name) VALUES ('alice');",
//! )
//! .unwrap();
//!
//! let migrator = Migrator::try_new(MigratorConfig::default().with_migrations_dir(dir.path())).unwrap();
//! let mut conn = Connection::open_in_memory().unwrap();
//! migrator.init(&mut conn).unwrap();
//! let report = migrator.up(&mut conn).unwrap();
//! assert_eq!(report.applied, vec!["create_users"]);
//!
//! let name: String = conn.query_row("SELECT name FROM users", [], |row| row.get(0)).unwrap();
//! assert_eq!(name, "alice");
//! ```

use crate::core::{parse_ledger_timestamp, Database, LedgerRecord, LEDGER_TIMESTAMP_FORMAT};
use crate::error::Error;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// Open a SQLite database file, or an in-memory database for `:memory:`.
pub fn open(path: impl AsRef<Path>) -> Result<Connection, Error> {
    let path = path.as_ref();
    let conn = if path == Path::new(":memory:") {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    Ok(conn)
}

impl Database for Connection {
    fn execute(&mut self, statement: &str) -> Result<(), Error> {
        // execute_batch accepts statements that return rows
        self.execute_batch(statement)?;
        Ok(())
    }

    fn ensure_ledger(&mut self, table: &str) -> Result<(), Error> {
        self.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )",
            table
        ))?;
        Ok(())
    }

    fn ledger_contains(&mut self, table: &str, description: &str) -> Result<bool, Error> {
        let exists: bool = self.query_row(
            &format!(
                "SELECT (SELECT COUNT(*) FROM {} WHERE description = ?1) > 0",
                table
            ),
            [description],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn ledger_insert(
        &mut self,
        table: &str,
        description: &str,
        applied_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut stmt = self.prepare(&format!(
            "INSERT INTO {} (description, created_at) VALUES (?1, ?2)",
            table
        ))?;
        stmt.execute(params![
            description,
            applied_at.format(LEDGER_TIMESTAMP_FORMAT).to_string()
        ])?;
        Ok(())
    }

    fn ledger_records(&mut self, table: &str) -> Result<Vec<LedgerRecord>, Error> {
        let mut stmt = self.prepare(&format!(
            "SELECT id, description, created_at FROM {} ORDER BY id",
            table
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, description, created_at)| {
                Ok(LedgerRecord {
                    id,
                    description,
                    created_at: parse_ledger_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}
