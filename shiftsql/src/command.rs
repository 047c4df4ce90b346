use crate::core::{Database, Direction, LedgerRecord, MigrationReport};
use crate::error::Error;
use crate::identity::MigrationFile;
use crate::migrator::Migrator;
use crate::scaffold::Scaffolder;
use std::fmt;
use std::path::PathBuf;

/// An action the command line can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the ledger table.
    Init,
    /// Apply pending up files.
    Up,
    /// Apply pending down files.
    Down,
    /// Show the ledger.
    List,
    /// Scaffold an empty up file per name.
    Create(Vec<String>),
    /// Show pending files in both directions.
    Status,
}

impl Command {
    /// Everything except `create` talks to the database.
    pub fn needs_database(&self) -> bool {
        !matches!(self, Command::Create(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Command::Init => "init",
            Command::Up => "up",
            Command::Down => "down",
            Command::List => "list",
            Command::Create(_) => "create",
            Command::Status => "status",
        })
    }
}

/// What a dispatched command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Initialized { table: String },
    Migrated(MigrationReport),
    Listed(Vec<LedgerRecord>),
    Created(Vec<PathBuf>),
    Status {
        up: Vec<MigrationFile>,
        down: Vec<MigrationFile>,
    },
}

/// Run `command`. Never terminates the process; errors are returned to the caller.
///
/// `db` may be `None` for commands that do not need a connection.
pub fn dispatch(
    command: Command,
    migrator: &Migrator,
    scaffolder: &Scaffolder,
    db: Option<&mut (dyn Database + '_)>,
) -> Result<Outcome, Error> {
    match command {
        Command::Create(names) => {
            if names.is_empty() {
                return Err(Error::Usage(
                    "create needs at least one migration name".to_string(),
                ));
            }
            scaffolder.create_all(names.as_slice()).map(Outcome::Created)
        }
        Command::Init => {
            migrator.init(connection(db, "init")?)?;
            Ok(Outcome::Initialized {
                table: migrator.ledger().table().to_string(),
            })
        }
        Command::Up => migrator
            .run(connection(db, "up")?, Direction::Up)
            .map(Outcome::Migrated),
        Command::Down => migrator
            .run(connection(db, "down")?, Direction::Down)
            .map(Outcome::Migrated),
        Command::List => migrator.history(connection(db, "list")?).map(Outcome::Listed),
        Command::Status => {
            let db = connection(db, "status")?;
            Ok(Outcome::Status {
                up: pending_or_empty(migrator, &mut *db, Direction::Up)?,
                down: pending_or_empty(migrator, &mut *db, Direction::Down)?,
            })
        }
    }
}

/// A direction whose directory was never created has nothing pending. `create` only makes
/// `up/`, so a fresh project has no `down/` yet.
fn pending_or_empty(
    migrator: &Migrator,
    db: &mut (dyn Database + '_),
    direction: Direction,
) -> Result<Vec<MigrationFile>, Error> {
    match migrator.pending(db, direction) {
        Err(Error::Scan { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(Vec::new())
        }
        result => result,
    }
}

fn connection<'a, 'db>(
    db: Option<&'a mut (dyn Database + 'db)>,
    command: &str,
) -> Result<&'a mut (dyn Database + 'db), Error> {
    db.ok_or_else(|| Error::Usage(format!("command '{}' needs a database connection", command)))
}
