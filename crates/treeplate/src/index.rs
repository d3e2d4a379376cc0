// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File discovery and change detection.
//!
//! A [`FileIndex`] maps every tracked template file to the modification time
//! last observed for it. [`discover`] builds a fresh index by walking the
//! template root; [`FileIndex::scan`] compares the recorded times against the
//! filesystem and reports whether anything changed.
//!
//! Freshly discovered records carry no timestamp, so the first scan after
//! discovery always reports a change and forces compilation.

use crate::error::{Result, TreeplateError};
use crate::fs::FileSystem;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One tracked template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path of the file.
    pub path: PathBuf,
    /// Last observed modification time; `None` until first scanned.
    pub last_modified: Option<SystemTime>,
}

impl FileRecord {
    /// Creates a record with an unknown modification time.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }
}

/// Outcome of a [`FileIndex::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files whose modification time advanced.
    pub modified: Vec<PathBuf>,
    /// Files that no longer exist and were dropped from the index.
    pub removed: Vec<PathBuf>,
    /// Files that could not be checked; their records are unchanged.
    pub failed: Vec<PathBuf>,
}

impl ScanReport {
    /// Whether any tracked file has new content.
    ///
    /// Removals alone do not count as a change.
    pub fn changed(&self) -> bool {
        !self.modified.is_empty()
    }
}

/// Mapping from template path to its [`FileRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    records: BTreeMap<PathBuf, FileRecord>,
}

impl FileIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `path` with an unknown modification time.
    ///
    /// Does nothing if the path is already tracked.
    pub fn insert(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.records
            .entry(path.clone())
            .or_insert_with(|| FileRecord::new(path));
    }

    /// Whether `path` is tracked.
    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    /// Returns the record for `path`.
    pub fn get(&self, path: &Path) -> Option<&FileRecord> {
        self.records.get(path)
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no file is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tracked paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.records.keys().map(PathBuf::as_path)
    }

    /// Replaces the tracked set with `fresh`, keeping the recorded time of
    /// every path that was already tracked.
    ///
    /// Paths missing from `fresh` are dropped; new paths start unknown.
    pub fn refresh(&mut self, fresh: FileIndex) {
        let mut records = fresh.records;
        for (path, record) in records.iter_mut() {
            if let Some(known) = self.records.get(path) {
                record.last_modified = known.last_modified;
            }
        }
        self.records = records;
    }

    /// Compares every tracked file against the filesystem.
    ///
    /// - a strictly newer modification time updates the record;
    /// - a file that no longer exists is removed from the index;
    /// - any other error leaves the record untouched.
    pub fn scan(&mut self, fs: &dyn FileSystem) -> ScanReport {
        let mut report = ScanReport::default();

        for (path, record) in self.records.iter_mut() {
            match fs.modified(path) {
                Ok(modified) => {
                    if record.last_modified.map_or(true, |known| modified > known) {
                        record.last_modified = Some(modified);
                        report.modified.push(path.clone());
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    report.removed.push(path.clone());
                }
                Err(err) => {
                    tracing::warn!("Could not check {}: {}", path.display(), err);
                    report.failed.push(path.clone());
                }
            }
        }

        for path in &report.removed {
            tracing::debug!("Template {} was removed", path.display());
            self.records.remove(path);
        }

        report
    }
}

/// Walks `root` and tracks every non-directory entry whose file name ends
/// with `suffix`.
///
/// # Errors
///
/// Returns [`TreeplateError::Discovery`] if the walk fails and
/// [`TreeplateError::NoTemplates`] if nothing matches.
pub fn discover(fs: &dyn FileSystem, root: &Path, suffix: &str) -> Result<FileIndex> {
    let entries = fs.list(root).map_err(|source| TreeplateError::Discovery {
        root: root.to_path_buf(),
        source,
    })?;

    let mut index = FileIndex::new();
    for entry in entries {
        if entry.is_dir {
            continue;
        }
        let matches = entry
            .path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(suffix));
        if matches {
            index.insert(entry.path);
        }
    }

    if index.is_empty() {
        return Err(TreeplateError::NoTemplates {
            root: root.to_path_buf(),
            suffix: suffix.to_string(),
        });
    }

    tracing::debug!("Discovered {} template(s) in {}", index.len(), root.display());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFileSystem;

    fn site() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.write("t/foo/home.html", "<html>{{.Title}}</html>");
        fs.write("t/foo/bar/baz.html", "<html>Baz</html>");
        fs.write("t/notes.txt", "not a template");
        fs
    }

    #[test]
    fn discover_selects_by_suffix() {
        let fs = site();
        let index = discover(&fs, Path::new("t"), ".html").unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.contains(Path::new("t/foo/home.html")));
        assert!(index.contains(Path::new("t/foo/bar/baz.html")));
        assert!(!index.contains(Path::new("t/notes.txt")));
        assert!(index.get(Path::new("t/foo/home.html")).unwrap().last_modified.is_none());
    }

    #[test]
    fn discover_without_matches_fails() {
        let fs = site();
        let err = discover(&fs, Path::new("t"), ".tmpl").unwrap_err();
        assert!(matches!(err, TreeplateError::NoTemplates { .. }));
    }

    #[test]
    fn discover_walk_error_fails() {
        let fs = site();
        fs.fail_list("t", true);
        let err = discover(&fs, Path::new("t"), ".html").unwrap_err();
        assert!(matches!(err, TreeplateError::Discovery { .. }));
    }

    #[test]
    fn first_scan_marks_everything_changed() {
        let fs = site();
        let mut index = discover(&fs, Path::new("t"), ".html").unwrap();

        let report = index.scan(&fs);
        assert!(report.changed());
        assert_eq!(report.modified.len(), 2);

        let report = index.scan(&fs);
        assert!(!report.changed());
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn scan_detects_newer_times() {
        let fs = site();
        let mut index = discover(&fs, Path::new("t"), ".html").unwrap();
        index.scan(&fs);

        fs.touch("t/foo/bar/baz.html");
        let report = index.scan(&fs);

        assert_eq!(report.modified, vec![PathBuf::from("t/foo/bar/baz.html")]);
    }

    #[test]
    fn scan_drops_deleted_files_without_reporting_change() {
        let fs = site();
        let mut index = discover(&fs, Path::new("t"), ".html").unwrap();
        index.scan(&fs);

        fs.remove("t/foo/bar/baz.html");
        let report = index.scan(&fs);

        assert!(!report.changed());
        assert_eq!(report.removed, vec![PathBuf::from("t/foo/bar/baz.html")]);
        assert!(!index.contains(Path::new("t/foo/bar/baz.html")));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn scan_keeps_records_on_transient_errors() {
        let fs = site();
        let mut index = discover(&fs, Path::new("t"), ".html").unwrap();
        index.scan(&fs);
        let before = index.clone();

        fs.fail_stat("t/foo/home.html", true);
        fs.touch("t/foo/home.html");
        let report = index.scan(&fs);

        assert!(!report.changed());
        assert_eq!(report.failed, vec![PathBuf::from("t/foo/home.html")]);
        assert_eq!(index, before);

        fs.fail_stat("t/foo/home.html", false);
        assert!(index.scan(&fs).changed());
    }

    #[test]
    fn refresh_keeps_known_times_and_adds_new_files() {
        let fs = site();
        let mut index = discover(&fs, Path::new("t"), ".html").unwrap();
        index.scan(&fs);
        let known = index.get(Path::new("t/foo/home.html")).unwrap().last_modified;

        fs.write("t/foo/new.html", "new");
        fs.remove("t/foo/bar/baz.html");
        index.refresh(discover(&fs, Path::new("t"), ".html").unwrap());

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(Path::new("t/foo/home.html")).unwrap().last_modified, known);
        assert!(index.get(Path::new("t/foo/new.html")).unwrap().last_modified.is_none());
        assert!(!index.contains(Path::new("t/foo/bar/baz.html")));

        let report = index.scan(&fs);
        assert_eq!(report.modified, vec![PathBuf::from("t/foo/new.html")]);
    }
}
