use std::path::PathBuf;

/// Error type for the shiftsql crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The migrations directory does not exist or could not be listed.
    #[error("cannot read migrations directory {}: {source}", dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A migration filename does not follow `<timestamp>_<description>.<direction>.sql`.
    #[error("malformed migration filename '{file}': {reason}")]
    Parse { file: String, reason: String },
    /// The ledger table could not be created.
    #[error("failed to create ledger table: {0}")]
    Schema(String),
    /// A ledger row could not be inserted.
    #[error("failed to record migration in ledger: {0}")]
    LedgerWrite(String),
    /// A statement from a migration file failed to execute.
    #[error("statement from '{file}' failed: {message}\n{statement}")]
    StatementExec {
        file: String,
        statement: String,
        message: String,
    },
    /// A migration file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid ledger table name '{0}'")]
    InvalidTableName(String),
    #[error("{0}")]
    Usage(String),
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),
    #[error("{0}")]
    Generic(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}
