// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! In-memory [`FileSystem`] for tests and embedding.
//!
//! Stat and list failures can be injected per path, and call counters show
//! whether a renderer touched the filesystem at all.

use crate::fs::{FileSystem, FsEntry};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, MemoryFile>,
    clock: u64,
    /// Paths whose `modified` fails with a non-NotFound error.
    failing: HashSet<PathBuf>,
    /// Roots whose listing fails.
    unreadable: HashSet<PathBuf>,
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicUsize,
    modified: AtomicUsize,
    read: AtomicUsize,
}

/// Snapshot of how many times each [`FileSystem`] operation was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsCalls {
    /// Calls to [`FileSystem::list`].
    pub list: usize,
    /// Calls to [`FileSystem::modified`].
    pub modified: usize,
    /// Calls to [`FileSystem::read`].
    pub read: usize,
}

impl FsCalls {
    /// Total number of calls.
    pub fn total(&self) -> usize {
        self.list + self.modified + self.read
    }
}

/// In-memory filesystem with a manual clock.
///
/// Every write advances the clock by one second, so a rewritten file always
/// has a strictly newer modification time. Clones share the same files, which
/// lets a test keep a handle while a renderer owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<MemoryState>>,
    calls: Arc<Counters>,
}

impl MemoryFileSystem {
    /// Creates an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a file, replacing any previous content.
    pub fn write(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.state();
        state.clock += 1;
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(state.clock);
        state.files.insert(
            path.as_ref().to_path_buf(),
            MemoryFile {
                content: content.into(),
                modified,
            },
        );
    }

    /// Rewrites a file's modification time without changing its content.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.state();
        state.clock += 1;
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(state.clock);
        if let Some(file) = state.files.get_mut(path.as_ref()) {
            file.modified = modified;
        }
    }

    /// Removes a file.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.state().files.remove(path.as_ref());
    }

    /// Makes `modified` fail for `path` with a non-NotFound error.
    pub fn fail_stat(&self, path: impl AsRef<Path>, failing: bool) {
        let mut state = self.state();
        if failing {
            state.failing.insert(path.as_ref().to_path_buf());
        } else {
            state.failing.remove(path.as_ref());
        }
    }

    /// Makes `list` fail for `root`.
    pub fn fail_list(&self, root: impl AsRef<Path>, failing: bool) {
        let mut state = self.state();
        if failing {
            state.unreadable.insert(root.as_ref().to_path_buf());
        } else {
            state.unreadable.remove(root.as_ref());
        }
    }

    /// Returns how many times each operation has been called so far.
    pub fn calls(&self) -> FsCalls {
        FsCalls {
            list: self.calls.list.load(Ordering::SeqCst),
            modified: self.calls.modified.load(Ordering::SeqCst),
            read: self.calls.read.load(Ordering::SeqCst),
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn list(&self, root: &Path) -> io::Result<Vec<FsEntry>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.unreadable.contains(root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot list {}", root.display()),
            ));
        }

        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for path in state.files.keys().filter(|p| p.starts_with(root) && *p != root) {
            let mut parent = path.parent();
            while let Some(dir) = parent {
                if !dir.starts_with(root) || dir == root {
                    break;
                }
                dirs.insert(dir.to_path_buf());
                parent = dir.parent();
            }
            entries.push(FsEntry::file(path));
        }

        // The root always lists as a directory, even with no files below it.
        let mut all = vec![FsEntry::dir(root)];
        all.extend(dirs.into_iter().map(FsEntry::dir));
        all.extend(entries);
        Ok(all)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.calls.modified.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.failing.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot stat {}", path.display()),
            ));
        }
        state
            .files
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| not_found(path))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.calls.read.fetch_add(1, Ordering::SeqCst);
        self.state()
            .files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", path.display()))
}
