// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Filesystem access for template discovery and reloading.
//!
//! Everything treeplate does with files goes through the [`FileSystem`]
//! trait, which is injected into renderers at construction time.
//!
//! # Implementations
//!
//! - [`OsFileSystem`]: the real filesystem, walked with `walkdir`
//! - [`MemoryFileSystem`](crate::MemoryFileSystem): in-memory files with a
//!   manual clock, for tests
//!
//! Implement [`FileSystem`] for other sources (embedded assets, overlays).

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// One entry produced by [`FileSystem::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    /// Full path of the entry, rooted at the listed directory.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl FsEntry {
    /// Creates a file entry.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
        }
    }

    /// Creates a directory entry.
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
        }
    }
}

/// Trait for the filesystem operations treeplate needs.
///
/// `modified` must report a missing file with [`io::ErrorKind::NotFound`];
/// the reloading renderer treats that kind as a deletion and every other
/// error as transient.
pub trait FileSystem: Send + Sync + fmt::Debug + 'static {
    /// Lists every entry below `root`, recursively.
    ///
    /// Any error met during the walk fails the whole listing.
    fn list(&self, root: &Path) -> io::Result<Vec<FsEntry>>;

    /// Returns the last modification time of `path`.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Reads the whole content of `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// The operating system filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl OsFileSystem {
    /// Creates a new handle on the real filesystem.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn list(&self, root: &Path) -> io::Result<Vec<FsEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            entries.push(FsEntry {
                path: entry.path().to_path_buf(),
                is_dir: entry.file_type().is_dir(),
            });
        }
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Cleans a template root the way paths are compared in the file index:
/// `.` components are dropped and trailing separators removed.
pub fn clean_root(root: &Path) -> PathBuf {
    let cleaned: PathBuf = root
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Derives a template name from a file path: the path relative to `root`,
/// joined with `/` on every platform. The filename suffix is kept.
///
/// Returns `None` when `path` is not below `root`.
pub fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Maps a template name back to the path it would be discovered at.
pub fn template_path(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in name.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path
}
