use crate::core::{Database, Direction, LedgerRecord, MigrationReport, DEFAULT_LEDGER_TABLE_NAME};
use crate::error::Error;
use crate::identity::MigrationFile;
use crate::ledger::Ledger;
use crate::scan::scan;
use crate::split::split_statements;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default directory holding the `up/` and `down/` migration directories.
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

/// Default zone the 14 filename digits are read in.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Where migrations live and how they are recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratorConfig {
    pub migrations_dir: PathBuf,
    pub table: String,
    pub time_zone: Tz,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            table: DEFAULT_LEDGER_TABLE_NAME.to_string(),
            time_zone: DEFAULT_TIME_ZONE,
        }
    }
}

impl MigratorConfig {
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set a custom name for the ledger table. Defaults to "migrations".
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Directory holding the files for `direction`, e.g. `./migrations/up`.
    pub fn directory(&self, direction: Direction) -> PathBuf {
        self.migrations_dir.join(direction.dir_name())
    }
}

/// The entrypoint for applying migration files.
///
/// A run scans the directory for one direction, and for each file in filename order skips it
/// if its description is already in the ledger, otherwise executes its statements and records
/// it. The first error stops the run: files before it stay applied and recorded, the failing
/// file may be partially applied and is not recorded, later files are untouched.
pub struct Migrator {
    config: MigratorConfig,
    ledger: Ledger,
    on_run_start: Option<Box<dyn Fn(Direction) + Send + Sync>>,
    on_run_complete: Option<Box<dyn Fn(&MigrationReport) + Send + Sync>>,
    on_migration_start: Option<Box<dyn Fn(&MigrationFile) + Send + Sync>>,
    on_migration_complete: Option<Box<dyn Fn(&MigrationFile, Duration) + Send + Sync>>,
    on_migration_skipped: Option<Box<dyn Fn(&MigrationFile) + Send + Sync>>,
    on_migration_error: Option<Box<dyn Fn(&MigrationFile, &Error) + Send + Sync>>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("config", &self.config)
            .field("on_run_start", &self.on_run_start.is_some())
            .field("on_run_complete", &self.on_run_complete.is_some())
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field("on_migration_complete", &self.on_migration_complete.is_some())
            .field("on_migration_skipped", &self.on_migration_skipped.is_some())
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish()
    }
}

impl Migrator {
    /// Create a new Migrator, validating the ledger table name.
    pub fn try_new(config: MigratorConfig) -> Result<Self, Error> {
        let ledger = Ledger::new(config.table.clone())?;
        Ok(Self {
            config,
            ledger,
            on_run_start: None,
            on_run_complete: None,
            on_migration_start: None,
            on_migration_complete: None,
            on_migration_skipped: None,
            on_migration_error: None,
        })
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Set a callback to be invoked before a run scans its directory.
    pub fn on_run_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        self.on_run_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked after every file of a run has been processed.
    pub fn on_run_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationReport) + Send + Sync + 'static,
    {
        self.on_run_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a file starts executing.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationFile) + Send + Sync + 'static,
    {
        self.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a file has been executed and recorded.
    /// The callback receives the file and how long it took.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationFile, Duration) + Send + Sync + 'static,
    {
        self.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a file is skipped because the ledger already has it.
    pub fn on_migration_skipped<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationFile) + Send + Sync + 'static,
    {
        self.on_migration_skipped = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when reading, executing or recording a file fails.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MigrationFile, &Error) + Send + Sync + 'static,
    {
        self.on_migration_error = Some(Box::new(callback));
        self
    }

    /// Create the ledger table if it does not exist.
    pub fn init<D: Database + ?Sized>(&self, db: &mut D) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::info!(table = self.ledger.table(), "Ensuring ledger table");
        self.ledger.ensure_schema(db)
    }

    /// Everything recorded in the ledger, in insertion order.
    pub fn history<D: Database + ?Sized>(&self, db: &mut D) -> Result<Vec<LedgerRecord>, Error> {
        self.ledger.list(db)
    }

    /// The files a run in `direction` would execute, without executing anything.
    pub fn pending<D: Database + ?Sized>(
        &self,
        db: &mut D,
        direction: Direction,
    ) -> Result<Vec<MigrationFile>, Error> {
        let mut pending = Vec::new();
        for path in scan(&self.config.directory(direction), direction)? {
            let migration = MigrationFile::parse(path, direction, self.config.time_zone)?;
            if !self.ledger.exists(db, migration.description())? {
                pending.push(migration);
            }
        }
        Ok(pending)
    }

    /// Apply all pending up files.
    pub fn up<D: Database + ?Sized>(&self, db: &mut D) -> Result<MigrationReport, Error> {
        self.run(db, Direction::Up)
    }

    /// Apply all pending down files.
    pub fn down<D: Database + ?Sized>(&self, db: &mut D) -> Result<MigrationReport, Error> {
        self.run(db, Direction::Down)
    }

    /// Apply every file in `direction` whose description is not yet in the ledger.
    pub fn run<D: Database + ?Sized>(
        &self,
        db: &mut D,
        direction: Direction,
    ) -> Result<MigrationReport, Error> {
        let dir = self.config.directory(direction);

        #[cfg(feature = "tracing")]
        let _run_span = tracing::info_span!("migrate", direction = %direction).entered();
        #[cfg(feature = "tracing")]
        tracing::info!(dir = %dir.display(), "Starting migrations");

        if let Some(ref callback) = self.on_run_start {
            callback(direction);
        }

        let mut report = MigrationReport::new(direction);
        for path in scan(&dir, direction)? {
            let migration = MigrationFile::parse(path, direction, self.config.time_zone)?;

            if self.ledger.exists(db, migration.description())? {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    file = migration.file_name(),
                    description = migration.description(),
                    "Skipping migration (already applied)"
                );
                if let Some(ref callback) = self.on_migration_skipped {
                    callback(&migration);
                }
                report.skipped.push(migration.description().to_string());
                continue;
            }

            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!(
                "migration",
                file = migration.file_name(),
                description = migration.description()
            )
            .entered();
            #[cfg(feature = "tracing")]
            tracing::info!("Starting migration");

            if let Some(ref callback) = self.on_migration_start {
                callback(&migration);
            }

            let migration_start = Instant::now();
            match self.apply(db, &migration) {
                Ok(statements) => {
                    let migration_duration = migration_start.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        statements = statements,
                        duration_ms = migration_duration.as_millis(),
                        "Migration completed successfully"
                    );

                    report.statements_executed += statements;
                    report.applied.push(migration.description().to_string());

                    if let Some(ref callback) = self.on_migration_complete {
                        callback(&migration, migration_duration);
                    }
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %error, "Migration failed");

                    if let Some(ref callback) = self.on_migration_error {
                        callback(&migration, &error);
                    }
                    return Err(error);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Migrations finished"
        );

        if let Some(ref callback) = self.on_run_complete {
            callback(&report);
        }
        Ok(report)
    }

    /// Read, execute and record one file. Returns the number of statements executed.
    fn apply<D: Database + ?Sized>(
        &self,
        db: &mut D,
        migration: &MigrationFile,
    ) -> Result<usize, Error> {
        let contents = read_migration(migration.path())?;
        let statements = split_statements(&contents);
        for statement in &statements {
            db.execute(statement)
                .map_err(|e| Error::StatementExec {
                    file: migration.file_name().to_string(),
                    statement: statement.to_string(),
                    message: e.to_string(),
                })?;
        }
        self.ledger
            .record(db, migration.description(), migration.applied_at())?;
        Ok(statements.len())
    }
}

fn read_migration(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SpyDatabase;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn migrations_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("up")).unwrap();
        fs::create_dir(dir.path().join("down")).unwrap();
        for (name, contents) in files {
            let sub = if name.ends_with(".down.sql") { "down" } else { "up" };
            fs::write(dir.path().join(sub).join(name), contents).unwrap();
        }
        dir
    }

    fn migrator(dir: &TempDir) -> Migrator {
        Migrator::try_new(MigratorConfig::default().with_migrations_dir(dir.path())).unwrap()
    }

    fn initialized_spy(migrator: &Migrator) -> SpyDatabase {
        let mut db = SpyDatabase::new();
        migrator.init(&mut db).unwrap();
        db
    }

    #[test]
    fn applies_files_in_timestamp_order() {
        let dir = migrations_dir(&[
            ("20200102000000_b.up.sql", "CREATE TABLE b(x int);"),
            ("20200101000000_a.up.sql", "CREATE TABLE a(x int);"),
        ]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);

        let report = migrator.up(&mut db).unwrap();

        assert_eq!(db.executed(), ["CREATE TABLE a(x int)", "CREATE TABLE b(x int)"]);
        assert_eq!(
            report,
            MigrationReport {
                direction: Direction::Up,
                applied: vec!["a".to_string(), "b".to_string()],
                skipped: vec![],
                statements_executed: 2,
            }
        );
        let descriptions: Vec<_> = migrator
            .history(&mut db)
            .unwrap()
            .into_iter()
            .map(|r| r.description)
            .collect();
        assert_eq!(descriptions, vec!["a", "b"]);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let dir = migrations_dir(&[(
            "20200101000000_a.up.sql",
            "CREATE TABLE t(x int); INSERT INTO t VALUES(1);",
        )]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);

        migrator.up(&mut db).unwrap();
        assert_eq!(db.executed().len(), 2);
        assert_eq!(db.ledger_writes(), 1);

        let report = migrator.up(&mut db).unwrap();
        assert_eq!(db.executed().len(), 2);
        assert_eq!(db.ledger_writes(), 1);
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, vec!["a"]);
    }

    #[test]
    fn recorded_description_is_skipped_without_executing() {
        let dir = migrations_dir(&[("20200101000000_a.up.sql", "CREATE TABLE t(x int);")]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);
        migrator
            .ledger()
            .record(&mut db, "a", chrono::Utc::now())
            .unwrap();

        let skipped = Arc::new(Mutex::new(Vec::new()));
        let skipped_clone = Arc::clone(&skipped);
        let migrator = migrator.on_migration_skipped(move |m| {
            skipped_clone
                .lock()
                .unwrap()
                .push(m.file_name().to_string());
        });

        migrator.up(&mut db).unwrap();
        assert!(db.executed().is_empty());
        assert_eq!(db.ledger_writes(), 1);
        assert_eq!(*skipped.lock().unwrap(), vec!["20200101000000_a.up.sql"]);
    }

    #[test]
    fn empty_directory_emits_only_start_and_complete() {
        let dir = migrations_dir(&[]);
        let events = Arc::new(Mutex::new(Vec::new()));
        let (e1, e2, e3, e4) = (
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
        );
        let migrator = migrator(&dir)
            .on_run_start(move |d| e1.lock().unwrap().push(format!("start {d}")))
            .on_migration_start(move |m| {
                e2.lock().unwrap().push(format!("migrate {}", m.file_name()))
            })
            .on_migration_skipped(move |m| {
                e3.lock().unwrap().push(format!("skip {}", m.file_name()))
            })
            .on_run_complete(move |r| e4.lock().unwrap().push(format!("complete {}", r.direction)));
        let mut db = initialized_spy(&migrator);

        let report = migrator.up(&mut db).unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["start up", "complete up"]);
        assert_eq!(db.ledger_writes(), 0);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn malformed_filename_stops_the_run() {
        let dir = migrations_dir(&[
            ("20200101000000_a.up.sql", "CREATE TABLE a(x int);"),
            ("bad.up.sql", "CREATE TABLE bad(x int);"),
        ]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);

        let err = migrator.up(&mut db).unwrap_err();
        assert!(matches!(err, Error::Parse { ref file, .. } if file == "bad.up.sql"));
        // "2020..." sorts before "bad", so the first file was applied
        assert_eq!(db.executed(), ["CREATE TABLE a(x int)"]);
        assert_eq!(db.ledger_writes(), 1);
    }

    #[test]
    fn failing_statement_leaves_earlier_files_applied() {
        let dir = migrations_dir(&[
            ("20200101000000_a.up.sql", "CREATE TABLE a(x int);"),
            (
                "20200102000000_b.up.sql",
                "CREATE TABLE b(x int); bleep blorp; CREATE TABLE b2(x int);",
            ),
            ("20200103000000_c.up.sql", "CREATE TABLE c(x int);"),
        ]);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = Arc::clone(&errors);
        let migrator = migrator(&dir).on_migration_error(move |m, _| {
            errors_clone
                .lock()
                .unwrap()
                .push(m.description().to_string())
        });
        let mut db = SpyDatabase::new().failing_on("bleep");
        migrator.init(&mut db).unwrap();

        let err = migrator.up(&mut db).unwrap_err();

        match err {
            Error::StatementExec {
                file,
                statement,
                message,
            } => {
                assert_eq!(file, "20200102000000_b.up.sql");
                assert_eq!(statement, "bleep blorp");
                assert_eq!(message, "syntax error near 'bleep'");
            }
            other => panic!("expected statement error, got {other:?}"),
        }
        // b ran its first statement, was not recorded, and c never ran
        assert_eq!(db.executed(), ["CREATE TABLE a(x int)", "CREATE TABLE b(x int)"]);
        let descriptions: Vec<_> = migrator
            .history(&mut db)
            .unwrap()
            .into_iter()
            .map(|r| r.description)
            .collect();
        assert_eq!(descriptions, vec!["a"]);
        assert_eq!(*errors.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn ledger_row_uses_filename_timestamp() {
        let dir = migrations_dir(&[("20200101120000_a.up.sql", "SELECT 1;")]);
        let migrator = Migrator::try_new(
            MigratorConfig::default()
                .with_migrations_dir(dir.path())
                .with_time_zone(Tz::UTC),
        )
        .unwrap();
        let mut db = initialized_spy(&migrator);

        migrator.up(&mut db).unwrap();

        let records = migrator.history(&mut db).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].created_at.format("%Y%m%d%H%M%S").to_string(),
            "20200101120000"
        );
    }

    #[test]
    fn down_files_split_on_semicolons_like_up_files() {
        let dir = migrations_dir(&[(
            "20200101000000_a.down.sql",
            "DROP TABLE b;\nDROP TABLE a;\n",
        )]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);

        let report = migrator.down(&mut db).unwrap();

        // each statement runs exactly once; the whole script is never re-executed per fragment
        assert_eq!(db.executed(), ["DROP TABLE b", "DROP TABLE a"]);
        assert_eq!(report.applied, vec!["a"]);
        assert_eq!(report.direction, Direction::Down);
    }

    #[test]
    fn down_file_sharing_an_applied_description_is_skipped() {
        let dir = migrations_dir(&[
            ("20200101000000_a.up.sql", "CREATE TABLE a(x int);"),
            ("20200101000000_a.down.sql", "DROP TABLE a;"),
        ]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);

        migrator.up(&mut db).unwrap();
        let report = migrator.down(&mut db).unwrap();

        assert_eq!(report.skipped, vec!["a"]);
        assert_eq!(db.executed(), ["CREATE TABLE a(x int)"]);
    }

    #[test]
    fn pending_lists_without_executing() {
        let dir = migrations_dir(&[
            ("20200101000000_a.up.sql", "CREATE TABLE a(x int);"),
            ("20200102000000_b.up.sql", "CREATE TABLE b(x int);"),
        ]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);
        migrator
            .ledger()
            .record(&mut db, "a", chrono::Utc::now())
            .unwrap();

        let pending = migrator.pending(&mut db, Direction::Up).unwrap();

        let names: Vec<_> = pending.iter().map(|m| m.file_name()).collect();
        assert_eq!(names, vec!["20200102000000_b.up.sql"]);
        assert!(db.executed().is_empty());
    }

    #[test]
    fn missing_direction_directory_is_a_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = Migrator::try_new(
            MigratorConfig::default().with_migrations_dir(dir.path()),
        )
        .unwrap();
        let mut db = initialized_spy(&migrator);
        assert!(matches!(migrator.up(&mut db), Err(Error::Scan { .. })));
    }

    #[test]
    fn run_without_ledger_table_fails() {
        let dir = migrations_dir(&[("20200101000000_a.up.sql", "CREATE TABLE a(x int);")]);
        let migrator = migrator(&dir);
        let mut db = SpyDatabase::new();
        assert!(migrator.up(&mut db).is_err());
        assert!(db.executed().is_empty());
    }

    #[test]
    fn invalid_table_name_is_rejected() {
        let err = Migrator::try_new(MigratorConfig::default().with_table("bad name")).unwrap_err();
        assert!(matches!(err, Error::InvalidTableName(_)));
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn emits_tracing_events() {
        let dir = migrations_dir(&[("20200101000000_a.up.sql", "SELECT 1;")]);
        let migrator = migrator(&dir);
        let mut db = initialized_spy(&migrator);

        let output = Arc::new(Mutex::new(Vec::<u8>::new()));
        let output_clone = Arc::clone(&output);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .without_time()
            .with_target(false)
            .with_ansi(false)
            .with_writer(move || {
                struct W(Arc<Mutex<Vec<u8>>>);
                impl std::io::Write for W {
                    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                        self.0.lock().unwrap().extend_from_slice(buf);
                        Ok(buf.len())
                    }
                    fn flush(&mut self) -> std::io::Result<()> {
                        Ok(())
                    }
                }
                W(output_clone.clone())
            })
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            migrator.up(&mut db).unwrap();
        });

        let output = String::from_utf8(output.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Starting migrations"));
        assert!(output.contains("migration{file=\"20200101000000_a.up.sql\" description=\"a\"}"));
        assert!(output.contains("Migration completed successfully statements=1"));
        assert!(output.contains("Migrations finished applied=1 skipped=0"));
    }
}
