// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

use std::path::PathBuf;

/// Errors surfaced before any [`crate::watcher::FileWatcher`] starts.
///
/// All variants here are fatal: callers are expected to print the
/// [`Display`](std::fmt::Display) message and exit with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    ConfigParse(String),

    #[error("invalid type for {name}: must be one of {valid}")]
    UnknownMetricType { name: String, valid: String },

    #[error("duplicate metric name: {0}")]
    DuplicateMetric(String),

    #[error("rule file not found: {}", .0.display())]
    RuleFileNotFound(PathBuf),

    #[error("in {}{message}", .path.display())]
    RuleSyntaxError { path: PathBuf, message: String },

    #[error("glob pattern has wildcards outside the final path component: {0}")]
    UnsupportedGlob(String),

    #[error("registry error: {0}")]
    Registry(#[from] prometheus::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
