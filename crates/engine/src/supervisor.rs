// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! `Supervisor` (spec §4.6): starts one [`FileWatcher`] per configured
//! file, waits for shutdown, stops them cooperatively.
use futures_util::future::join_all;

use crate::watcher::FileWatcher;

/// Owns every configured [`FileWatcher`] and coordinates start/stop across
/// all of them.
pub struct Supervisor {
    watchers: Vec<FileWatcher>,
}

impl Supervisor {
    pub fn new(watchers: Vec<FileWatcher>) -> Self {
        Self { watchers }
    }

    /// Call `watch()` on every watcher. Must run inside a
    /// `tokio::task::LocalSet`: each watcher spawns a `!Send` task bound
    /// to `Rc`-shared rule state.
    pub fn start_all(&mut self) {
        for watcher in &mut self.watchers {
            watcher.watch();
        }
    }

    /// Await every watcher's `stop()` concurrently. A watcher whose
    /// notification channel was lost still completes `stop()` cleanly
    /// (spec §4.1: fatal to that watcher only); failures inside an
    /// individual watcher are logged where they occur and never prevent
    /// the others from stopping (spec §4.6).
    pub async fn stop_all(&mut self) {
        join_all(self.watchers.iter_mut().map(|w| w.stop())).await;
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
