// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::line_buffer::LineBuffer;

/// Identifies a per-file watch within a [`FileWatcher`](crate::watcher::FileWatcher).
///
/// The `notify` crate watches at directory granularity and does not hand
/// back a raw descriptor the way inotify does for an individual path, so
/// this is a synthetic id assigned when an entry is created. It exists to
/// satisfy the dual-keyed lookup contract spec'd for `WatchedFileTable`
/// (directory events arrive keyed by filename, bookkeeping elsewhere wants
/// to address an entry by an opaque "this file is currently tracked" token)
/// even though, under `notify`, both indices ultimately resolve to the same
/// watched directory subscription.
pub type WatchId = u64;

/// Bookkeeping for one file currently matching a watch.
pub struct WatchedFileEntry {
    pub real_path: PathBuf,
    pub file: Option<File>,
    pub offset: u64,
    pub descriptor: Option<WatchId>,
    pub buffer: LineBuffer,
}

impl WatchedFileEntry {
    fn new(real_path: PathBuf) -> Self {
        Self {
            real_path,
            file: None,
            offset: 0,
            descriptor: None,
            buffer: LineBuffer::new(),
        }
    }
}

/// How [`WatchedFileTable::upsert`] should treat one field of an entry.
pub enum Patch<T> {
    /// Leave the field as it is.
    Keep,
    /// Set the field to this value.
    Set(T),
    /// Explicitly clear the field to `None`.
    Clear,
}

/// Associative structure keyed by both real path and watch descriptor,
/// returning the same shared entry either way (spec §4.2).
#[derive(Default)]
pub struct WatchedFileTable {
    by_path: HashMap<PathBuf, Rc<RefCell<WatchedFileEntry>>>,
    by_descriptor: HashMap<WatchId, PathBuf>,
    next_id: WatchId,
}

impl WatchedFileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh watch id for a newly tracked file.
    pub fn next_watch_id(&mut self) -> WatchId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert or update the entry for `path`. Only fields passed as
    /// [`Patch::Set`] or [`Patch::Clear`] are touched; [`Patch::Keep`]
    /// leaves the existing value (or `None` for a brand new entry).
    pub fn upsert(
        &mut self,
        path: &Path,
        file: Patch<File>,
        descriptor: Patch<WatchId>,
    ) -> Rc<RefCell<WatchedFileEntry>> {
        let entry = self
            .by_path
            .entry(path.to_path_buf())
            .or_insert_with(|| Rc::new(RefCell::new(WatchedFileEntry::new(path.to_path_buf()))))
            .clone();

        {
            let mut e = entry.borrow_mut();
            match file {
                Patch::Keep => {}
                Patch::Set(f) => e.file = Some(f),
                Patch::Clear => e.file = None,
            }
            let old_descriptor = e.descriptor;
            match descriptor {
                Patch::Keep => {}
                Patch::Set(id) => e.descriptor = Some(id),
                Patch::Clear => e.descriptor = None,
            }
            if e.descriptor != old_descriptor {
                if let Some(old) = old_descriptor {
                    self.by_descriptor.remove(&old);
                }
                if let Some(new) = e.descriptor {
                    self.by_descriptor.insert(new, path.to_path_buf());
                }
            }
        }

        entry
    }

    pub fn get_by_path(&self, path: &Path) -> Option<Rc<RefCell<WatchedFileEntry>>> {
        self.by_path.get(path).cloned()
    }

    pub fn get_by_descriptor(&self, id: WatchId) -> Option<Rc<RefCell<WatchedFileEntry>>> {
        let path = self.by_descriptor.get(&id)?;
        self.by_path.get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Remove and return the entry for `path`, releasing its descriptor
    /// index entry too.
    pub fn remove(&mut self, path: &Path) -> Option<Rc<RefCell<WatchedFileEntry>>> {
        let entry = self.by_path.remove(path)?;
        let descriptor = entry.borrow().descriptor;
        if let Some(id) = descriptor {
            self.by_descriptor.remove(&id);
        }
        Some(entry)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.by_path.keys()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &WatchId> {
        self.by_descriptor.keys()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
