// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! CLI surface (spec §6), grounded in the teacher's `crates/mux/src/config.rs`
//! `clap::Args`-derived config struct, with defaults taken from the Python
//! reference's `lmetrics/main.py` `LMetricsScript.get_parser` where the two
//! disagree with the teacher's own conventions (`--log-level` defaults to
//! `warn` here, not the teacher's `info`, since that is the behavior this
//! system actually shipped with).
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Parse and expose metrics scraped from log files to Prometheus.
#[derive(Debug, Clone, Parser)]
#[command(name = "lmetrics", version, about)]
pub struct Cli {
    /// Host address to bind the web server on.
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "LMETRICS_HOST")]
    pub host: String,

    /// Port to run the web server on.
    #[arg(short, long, default_value_t = 8000, env = "LMETRICS_PORT")]
    pub port: u16,

    /// Include process-level stats (CPU, memory, file descriptors) in the
    /// exported metrics, via `prometheus`'s `ProcessCollector`.
    #[arg(long)]
    pub process_stats: bool,

    /// Minimum level for log messages.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, env = "LMETRICS_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LMETRICS_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Configuration file describing metrics and watched files.
    pub config: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Critical,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            // `tracing` has no "critical" level; map it to the nearest one.
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
