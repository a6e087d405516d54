// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! File-tailing and rule-evaluation engine.
//!
//! This crate is the core described by the specification: it keeps a set of
//! glob patterns pinned to a moving set of real files on disk, consumes
//! newly appended bytes exactly once, splits them into lines, and dispatches
//! each line through a pipeline of compiled regular-expression rules.
//!
//! Configuration loading, metric registration, and the rule-source scripting
//! runtime are split into their own modules/crates; this crate defines the
//! seams (`EngineError`, `RuleAction`, `MetricHandle`) that those pieces
//! plug into without depending on them.

pub mod config;
pub mod error;
pub mod line_buffer;
pub mod metric;
pub mod rule;
pub mod supervisor;
pub mod table;
pub mod value;
pub mod watcher;

pub use config::{load_config, Config, WatchConfig};
pub use error::EngineError;
pub use metric::{create_metrics, MetricHandle, MetricKind, MetricSpec};
pub use rule::{ActionError, FileAnalyzer, RuleAction, RuleSet, RuleSetCache, RuleSpec};
pub use supervisor::Supervisor;
pub use value::MetricValue;
pub use watcher::FileWatcher;
