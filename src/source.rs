//! Log discovery
//!
//! Walks each log directory recursively and loads every regular file whose
//! name (and whose parent directories' names) do not start with a dot.
//! Files come out ordered by directory argument, then by path, so ingestion
//! order never depends on the filesystem.

use crate::error::{AggregateError, ParseError};
use crate::report::SkippedUnit;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// One raw log: the directory it was found under, its path relative to that
/// directory, and its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub directory: String,
    pub filename: String,
    pub text: String,
}

impl LogSource {
    pub fn new(
        directory: impl Into<String>,
        filename: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// Unit name used in logs and skipped-unit reports
    pub fn unit(&self) -> String {
        Path::new(&self.directory)
            .join(&self.filename)
            .display()
            .to_string()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn collect_log_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Load every log under `dirs`
///
/// Files that can't be read as UTF-8 text are returned as skipped units
/// instead of failing the whole run.
pub fn discover(dirs: &[PathBuf]) -> (Vec<LogSource>, Vec<SkippedUnit>) {
    let files: Vec<(&PathBuf, PathBuf)> = dirs
        .iter()
        .flat_map(|dir| {
            let found = collect_log_files(dir);
            debug!("Found {} log files under {}", found.len(), dir.display());
            found.into_iter().map(move |path| (dir, path))
        })
        .collect();

    let loaded: Vec<Result<LogSource, SkippedUnit>> = files
        .par_iter()
        .map(|(dir, path)| {
            let relative = path.strip_prefix(dir).unwrap_or(path);
            let directory = dir.display().to_string();
            let filename = relative.display().to_string();
            fs::read_to_string(path)
                .map(|text| LogSource::new(directory, filename, text))
                .map_err(|e| {
                    let error = AggregateError::from(ParseError::Unreadable(e.to_string()));
                    SkippedUnit::new(path.display().to_string(), &error)
                })
        })
        .collect();

    let mut sources = Vec::with_capacity(loaded.len());
    let mut skipped = Vec::new();
    for item in loaded {
        match item {
            Ok(source) => sources.push(source),
            Err(unit) => {
                warn!("Skipping {}: {}", unit.unit, unit.reason);
                skipped.push(unit);
            }
        }
    }

    (sources, skipped)
}
