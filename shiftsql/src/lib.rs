#![cfg_attr(docsrs, feature(doc_cfg))]
//! `shiftsql` applies versioned SQL migration files and records them in a ledger table.
//!
//! Migrations are plain files in two directories:
//!
//! ```text
//! migrations/
//!   up/20240101090000_create_users.up.sql
//!   up/20240102090000_add_email.up.sql
//!   down/20240102090000_add_email.down.sql
//! ```
//!
//! A file is named `<YYYYMMDDHHmmss>_<description>.<up|down>.sql`. Files apply in filename
//! order, which is timestamp order. Each file's contents are split on `;` and the statements
//! run one by one; once all of them succeed a row with the file's description and timestamp
//! is inserted into the ledger table. Files whose description is already in the ledger are
//! skipped, so running the same direction twice does nothing the second time.
//!
//! There is no transaction around a file: if a statement fails, the statements before it in
//! that file stay applied, the file is not recorded, and the run stops with an error.
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag (default).
//! - [`MySQL`](mysql) - available with the `mysql` feature flag.
//!
//! Any other engine can be plugged in by implementing [`Database`].
//!
//! # Other features
//!
//! - `tracing`: structured logging of runs and migrations with the `tracing` crate.
//! - `testing`: [`testing::SpyDatabase`], an in-memory [`Database`] that counts what it runs.

mod command;
pub use command::{dispatch, Command, Outcome};

mod core;
pub use crate::core::{Database, Direction, LedgerRecord, MigrationReport, DEFAULT_LEDGER_TABLE_NAME};

mod error;
pub use error::Error;

mod identity;
pub use identity::{parse_file_name, timestamp_to_utc, MigrationFile};

mod ledger;
pub use ledger::Ledger;

mod migrator;
pub use migrator::{Migrator, MigratorConfig, DEFAULT_MIGRATIONS_DIR, DEFAULT_TIME_ZONE};

mod scaffold;
pub use scaffold::Scaffolder;

mod scan;
pub use scan::scan;

mod split;
pub use split::split_statements;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;
