// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! `FileWatcher` (spec §4.1) — the heart of the engine: keeps the set of
//! real files matching one glob in sync with disk and feeds every appended
//! byte, exactly once and in order per file, through a `FileAnalyzer`.
//!
//! Built on `notify`, the same crate the teacher's own `LogWatcher`
//! (`driver/log_watch.rs`) uses for its single-file case. Unlike that
//! watcher, this one is event-driven only (no polling fallback — spec.md
//! requires inotify/kqueue-class notification as primary), supports glob
//! expansion, and correlates the two halves of a same-directory rename via
//! `notify`'s rename-cookie (`EventAttributes::tracker`), the Rust analogue
//! of inotify's move cookie that spec §3's `MoveCookieSet` is built around.
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::WatchConfig;
use crate::line_buffer::LineBuffer;
use crate::rule::FileAnalyzer;
use crate::table::{Patch, WatchedFileEntry, WatchedFileTable};

/// Correlates the two halves of a same-directory rename (spec §3,
/// `MoveCookieSet`). `notify`'s inotify backend surfaces the kernel's
/// rename cookie here on platforms that support it.
type MoveCookie = usize;

/// Drives one [`WatchConfig`]: either a concrete path or a glob with
/// wildcards restricted to the basename (spec §4.1).
pub struct FileWatcher {
    config: WatchConfig,
    analyzer: Rc<FileAnalyzer>,
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig, analyzer: Rc<FileAnalyzer>) -> Self {
        Self {
            config,
            analyzer,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Begin asynchronous observation. Idempotent after a prior `stop()`:
    /// calling `watch()` again on an already-stopped watcher is a no-op
    /// (the spec only requires idempotence for a *repeated* `watch()`, not
    /// resumption after `stop()`).
    ///
    /// Must be called from within a `tokio::task::LocalSet` — the rule
    /// state reachable from `analyzer` is `!Send` (bound to the embedded
    /// scripting runtime), so the watch loop is spawned with
    /// `spawn_local`.
    pub fn watch(&mut self) {
        if self.task.is_some() {
            return;
        }
        let config = self.config.clone();
        let analyzer = self.analyzer.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::task::spawn_local(async move {
            run(config, analyzer, cancel).await;
        }));
    }

    /// Cancel the watch task and await its cleanup: every open file handle
    /// closed, every watch descriptor released, the notification channel
    /// dropped. Safe to call before `watch()` and after a prior `stop()`
    /// (both are no-ops).
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn run(config: WatchConfig, analyzer: Rc<FileAnalyzer>, cancel: CancellationToken) {
    let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(err) => {
            tracing::error!(dir = %config.dir.display(), error = %err, "failed to start notification channel");
            return;
        }
    };

    if let Err(err) = watcher.watch(&config.dir, RecursiveMode::NonRecursive) {
        tracing::error!(dir = %config.dir.display(), error = %err, "failed to watch directory");
        return;
    }

    let mut table = WatchedFileTable::new();
    let mut move_cookies: HashSet<MoveCookie> = HashSet::new();

    bootstrap(&config, &analyzer, &mut table, &mut watcher);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => {
                match event {
                    Some(Ok(event)) => {
                        handle_event(&config, &analyzer, &mut table, &mut watcher, &mut move_cookies, event);
                    }
                    Some(Err(err)) => {
                        tracing::error!(dir = %config.dir.display(), error = %err, "notification channel lost");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let tracked: Vec<PathBuf> = table.paths().cloned().collect();
    for path in tracked {
        table.remove(&path);
        let _ = watcher.unwatch(&path);
    }
    let _ = watcher.unwatch(&config.dir);
}

fn bootstrap(
    config: &WatchConfig,
    analyzer: &Rc<FileAnalyzer>,
    table: &mut WatchedFileTable,
    watcher: &mut RecommendedWatcher,
) {
    let entries = match std::fs::read_dir(&config.dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %config.dir.display(), error = %err, "failed to list directory at startup");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !filename_matches(config, &path) || !path.is_file() {
            continue;
        }
        open_from_start(path, analyzer, table, watcher);
    }
}

/// A path is a match when it sits directly in the watched directory and
/// its basename matches the configured pattern (spec §4.1 design note:
/// wildcards are restricted to the basename).
fn filename_matches(config: &WatchConfig, path: &Path) -> bool {
    path.parent() == Some(config.dir.as_path())
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| config.pattern.matches(name))
            .unwrap_or(false)
}

/// absent/open, create (or moved-to without a correlating cookie): open at
/// offset 0, drain current content, install a file watch, record the
/// entry. If the name was already tracked (row: "open, create of same
/// name"), the prior handle is closed first.
fn open_from_start(
    path: PathBuf,
    analyzer: &Rc<FileAnalyzer>,
    table: &mut WatchedFileTable,
    watcher: &mut RecommendedWatcher,
) {
    if table.remove(&path).is_some() {
        let _ = watcher.unwatch(&path);
    }

    let file = match File::open(&path) {
        Ok(f) => f,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "transient read error opening file");
            return;
        }
    };

    if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        tracing::warn!(path = %path.display(), error = %err, "failed to attach watch, dropping entry");
        return;
    }

    let watch_id = table.next_watch_id();
    let entry = table.upsert(&path, Patch::Set(file), Patch::Set(watch_id));
    let mut e = entry.borrow_mut();
    let WatchedFileEntry { file, offset, buffer, .. } = &mut *e;
    if let Some(file) = file {
        read_and_dispatch(file, offset, buffer, analyzer);
    }
}

/// absent, moved-to with a cookie found in the move set: open the file but
/// seek to its current end and *do not* re-emit prior content — the bytes
/// were already delivered under the old name.
fn open_at_end(path: PathBuf, table: &mut WatchedFileTable, watcher: &mut RecommendedWatcher) {
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "transient read error opening file");
            return;
        }
    };
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);

    if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        tracing::warn!(path = %path.display(), error = %err, "failed to attach watch, dropping entry");
        return;
    }

    let watch_id = table.next_watch_id();
    let entry = table.upsert(&path, Patch::Set(file), Patch::Set(watch_id));
    let mut e = entry.borrow_mut();
    e.offset = len;
    e.buffer.reset();
}

/// open, delete | moved-from: release the watch, close the handle, drop
/// the entry.
fn handle_delete(path: &Path, table: &mut WatchedFileTable, watcher: &mut RecommendedWatcher) {
    if table.remove(path).is_some() {
        let _ = watcher.unwatch(path);
    }
}

/// open, modify: read from the current offset and push the new bytes.
fn handle_modify(path: &Path, analyzer: &Rc<FileAnalyzer>, table: &mut WatchedFileTable) {
    let Some(entry) = table.get_by_path(path) else {
        return;
    };
    let mut e = entry.borrow_mut();
    let crate::table::WatchedFileEntry { file, offset, buffer, .. } = &mut *e;
    if let Some(file) = file {
        read_and_dispatch(file, offset, buffer, analyzer);
    }
}

/// Read every byte available past `offset`, detecting in-place truncation
/// along the way (spec §4.1: "implementers should make it explicit"): if
/// the file shrank below the tracked offset, reset to zero and re-drain
/// from the start rather than seeking past end-of-file.
fn read_and_dispatch(file: &mut File, offset: &mut u64, buffer: &mut LineBuffer, analyzer: &Rc<FileAnalyzer>) {
    let len = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(err) => {
            tracing::debug!(error = %err, "transient read error");
            return;
        }
    };
    if len < *offset {
        *offset = 0;
        buffer.reset();
    }
    if let Err(err) = file.seek(SeekFrom::Start(*offset)) {
        tracing::debug!(error = %err, "transient read error");
        return;
    }
    let mut chunk = Vec::new();
    if let Err(err) = file.read_to_end(&mut chunk) {
        tracing::debug!(error = %err, "transient read error");
        return;
    }
    *offset += chunk.len() as u64;
    buffer.push(&chunk, |line| analyzer.analyze_line(line));
}

fn handle_event(
    config: &WatchConfig,
    analyzer: &Rc<FileAnalyzer>,
    table: &mut WatchedFileTable,
    watcher: &mut RecommendedWatcher,
    move_cookies: &mut HashSet<MoveCookie>,
    event: notify::Event,
) {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            handle_rename_both(config, analyzer, table, watcher, &event.paths[0], &event.paths[1]);
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            if let Some(path) = event.paths.into_iter().next() {
                if filename_matches(config, &path) {
                    match event.attrs.tracker() {
                        Some(cookie) => {
                            handle_delete(&path, table, watcher);
                            move_cookies.insert(cookie);
                        }
                        // No cookie to correlate the other half with: the
                        // spec's resolved open question treats a lone half
                        // as a plain deletion (spec §9).
                        None => handle_delete(&path, table, watcher),
                    }
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            if let Some(path) = event.paths.into_iter().next() {
                if filename_matches(config, &path) {
                    match event.attrs.tracker() {
                        Some(cookie) if move_cookies.remove(&cookie) => open_at_end(path, table, watcher),
                        _ => open_from_start(path, analyzer, table, watcher),
                    }
                }
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) | EventKind::Modify(ModifyKind::Any) => {
            for path in event.paths {
                if !filename_matches(config, &path) {
                    continue;
                }
                if table.contains(&path) {
                    handle_modify(&path, analyzer, table);
                } else if path.is_file() {
                    open_from_start(path, analyzer, table, watcher);
                } else {
                    handle_delete(&path, table, watcher);
                }
            }
        }
        EventKind::Create(_) => {
            for path in event.paths {
                if filename_matches(config, &path) {
                    open_from_start(path, analyzer, table, watcher);
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                if filename_matches(config, &path) {
                    handle_delete(&path, table, watcher);
                }
            }
        }
        EventKind::Modify(ModifyKind::Data(_)) => {
            for path in event.paths {
                if table.contains(&path) {
                    handle_modify(&path, analyzer, table);
                }
            }
        }
        _ => {}
    }
}

/// `RenameMode::Both`: both halves of the rename arrive in a single event
/// (e.g. Linux inotify). When both the old and new names match the
/// pattern, the tracked entry is migrated in place — same file handle,
/// same offset, no re-drain — rather than closed and reopened.
fn handle_rename_both(
    config: &WatchConfig,
    analyzer: &Rc<FileAnalyzer>,
    table: &mut WatchedFileTable,
    watcher: &mut RecommendedWatcher,
    from: &Path,
    to: &Path,
) {
    let from_matches = filename_matches(config, from);
    let to_matches = filename_matches(config, to);

    match (from_matches, to_matches) {
        (true, true) => {
            let Some(entry) = table.remove(from) else {
                open_from_start(to.to_path_buf(), analyzer, table, watcher);
                return;
            };
            let _ = watcher.unwatch(from);
            let (file, offset) = {
                let mut e = entry.borrow_mut();
                (e.file.take(), e.offset)
            };
            let Some(file) = file else {
                open_from_start(to.to_path_buf(), analyzer, table, watcher);
                return;
            };
            if watcher.watch(to, RecursiveMode::NonRecursive).is_err() {
                tracing::warn!(path = %to.display(), "failed to attach watch after rename, dropping entry");
                return;
            }
            let watch_id = table.next_watch_id();
            let new_entry = table.upsert(to, Patch::Set(file), Patch::Set(watch_id));
            new_entry.borrow_mut().offset = offset;
        }
        (true, false) => handle_delete(from, table, watcher),
        (false, true) => open_from_start(to.to_path_buf(), analyzer, table, watcher),
        (false, false) => {}
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
