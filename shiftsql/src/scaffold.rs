use crate::core::Direction;
use crate::error::Error;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Writes new, empty up-migration files named after the current time.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaffolder {
    dir: PathBuf,
    time_zone: Tz,
}

impl Scaffolder {
    /// `dir` is the directory the up files go in, e.g. `./migrations/up`.
    /// Filename timestamps are local times in `time_zone`, the same zone the migrator
    /// reads them in.
    pub fn new(dir: impl Into<PathBuf>, time_zone: Tz) -> Self {
        Self {
            dir: dir.into(),
            time_zone,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create `<now>_<slug>.up.sql` for `name`.
    pub fn create(&self, name: &str) -> Result<PathBuf, Error> {
        self.create_at(name, Utc::now())
    }

    /// Create `<now>_<slug>.up.sql` for each name, in order.
    pub fn create_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PathBuf>, Error> {
        let now = Utc::now();
        names
            .iter()
            .map(|name| self.create_at(name.as_ref(), now))
            .collect()
    }

    /// Create the file for `name` as if the current time were `now`.
    /// Fails if a file with the same name already exists.
    pub fn create_at(&self, name: &str, now: DateTime<Utc>) -> Result<PathBuf, Error> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(Error::Usage(format!(
                "migration name '{}' has no letters or digits",
                name
            )));
        }

        let timestamp = now.with_timezone(&self.time_zone).format("%Y%m%d%H%M%S");
        let path = self
            .dir
            .join(format!("{}_{}{}", timestamp, slug, Direction::Up.suffix()));

        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| Error::Io { path, source }
        };
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_error(&path))?;

        #[cfg(feature = "tracing")]
        tracing::info!(path = %path.display(), "Created migration file");

        Ok(path)
    }
}

/// Lowercase `name`, turning every run of other characters into a single `_`.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}
