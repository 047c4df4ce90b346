use crate::core::Direction;
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// List the migration files for `direction` in `dir`, ascending by filename.
///
/// Filenames start with a timestamp, so filename order is chronological order.
/// An empty directory yields an empty list.
pub fn scan(dir: &Path, direction: Direction) -> Result<Vec<PathBuf>, Error> {
    let scan_error = |source| Error::Scan {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_error)? {
        let path = entry.map_err(scan_error)?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(direction.suffix()));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
