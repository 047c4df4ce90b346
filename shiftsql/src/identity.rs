//! Migration identity: the timestamp and description embedded in a filename.
//!
//! Files are named `<YYYYMMDDHHmmss>_<description>.up.sql` or
//! `<YYYYMMDDHHmmss>_<description>.down.sql`.

use crate::core::Direction;
use crate::error::Error;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{14}").expect("timestamp pattern is valid"));
static UP_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(.*?)\.up").expect("up description pattern is valid"));
static DOWN_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(.*?)\.down").expect("down description pattern is valid"));

/// A migration file found on disk, with its identity parsed from the filename.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationFile {
    path: PathBuf,
    direction: Direction,
    timestamp: String,
    description: String,
    applied_at: DateTime<Utc>,
}

impl MigrationFile {
    /// Parse the identity of the file at `path`.
    ///
    /// Only the filename is inspected, so the directory prefix never affects the result.
    /// The 14 timestamp digits are read as a wall-clock time in `time_zone`.
    pub fn parse(
        path: impl Into<PathBuf>,
        direction: Direction,
        time_zone: Tz,
    ) -> Result<Self, Error> {
        let path = path.into();
        let file_name = file_name(&path)?;
        let (timestamp, description) = parse_file_name(file_name, direction)?;
        let applied_at = timestamp_to_utc(&timestamp, time_zone).map_err(|reason| Error::Parse {
            file: file_name.to_string(),
            reason,
        })?;
        Ok(Self {
            path,
            direction,
            timestamp,
            description,
            applied_at,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        // checked to be valid UTF-8 in parse()
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The raw 14-digit timestamp, `YYYYMMDDHHmmss`.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The description, used as the ledger identity key.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The filename timestamp as an instant; this is what the ledger records.
    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }
}

fn file_name(path: &Path) -> Result<&str, Error> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Parse {
            file: path.display().to_string(),
            reason: "filename is missing or not valid UTF-8".to_string(),
        })
}

/// Extract `(timestamp, description)` from a migration filename.
pub fn parse_file_name(file_name: &str, direction: Direction) -> Result<(String, String), Error> {
    let parse_error = |reason: &str| Error::Parse {
        file: file_name.to_string(),
        reason: reason.to_string(),
    };

    let timestamp = TIMESTAMP
        .find(file_name)
        .ok_or_else(|| parse_error("no 14-digit timestamp"))?
        .as_str()
        .to_string();

    let pattern = match direction {
        Direction::Up => &*UP_DESCRIPTION,
        Direction::Down => &*DOWN_DESCRIPTION,
    };
    let description = pattern
        .captures(file_name)
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| {
            parse_error(&format!(
                "no description between '_' and '{}'",
                direction.terminator()
            ))
        })?
        .as_str()
        .to_string();

    Ok((timestamp, description))
}

/// Interpret `YYYYMMDDHHmmss` as a local time in `time_zone`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant; local times skipped
/// by a DST jump are rejected.
pub fn timestamp_to_utc(timestamp: &str, time_zone: Tz) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M%S")
        .map_err(|e| format!("invalid timestamp '{}': {}", timestamp, e))?;
    time_zone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("timestamp '{}' does not exist in {}", timestamp, time_zone))
}
