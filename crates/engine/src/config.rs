// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! YAML configuration loading (spec §6).
//!
//! Metric type construction is an external collaborator; this module only
//! parses and validates the `metrics:`/`files:` top-level keys into typed
//! structs, the same separation the teacher draws between `clap`-derived
//! CLI config and the subsystems that actually consume it.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::metric::{MetricKind, MetricSpec, VALID_KINDS};

#[derive(Debug, serde::Deserialize)]
struct RawConfig {
    #[serde(default)]
    metrics: HashMap<String, RawMetricConfig>,
    #[serde(default)]
    files: HashMap<String, String>,
}

#[derive(Debug, serde::Deserialize)]
struct RawMetricConfig {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    buckets: Option<Vec<f64>>,
}

/// One `files:` entry, split into the watched directory and a basename-only
/// glob pattern (spec §4.1 design note: wildcards in directory components
/// are unsupported — the parent dir is the single watched directory).
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub dir: PathBuf,
    pub pattern: glob::Pattern,
    pub rule_source: PathBuf,
}

/// Fully validated top-level configuration, ready to build metrics and
/// watchers from.
#[derive(Debug)]
pub struct Config {
    pub metrics: Vec<MetricSpec>,
    pub files: Vec<WatchConfig>,
}

/// Parse and validate a YAML configuration document.
///
/// Unknown keys under a metric are accepted and ignored (spec §6); an
/// unknown `type` or a glob with wildcards outside the basename is a
/// configuration error, reported here so callers can exit before any
/// watcher starts.
pub fn load_config(contents: &str) -> Result<Config, EngineError> {
    let raw: RawConfig =
        serde_yaml::from_str(contents).map_err(|err| EngineError::ConfigParse(err.to_string()))?;

    let mut metrics = Vec::with_capacity(raw.metrics.len());
    for (name, m) in raw.metrics {
        let kind = MetricKind::parse(&m.kind).ok_or_else(|| EngineError::UnknownMetricType {
            name: name.clone(),
            valid: VALID_KINDS.join(", "),
        })?;
        metrics.push(MetricSpec {
            name,
            description: m.description,
            kind,
            labels: m.labels,
            buckets: m.buckets,
        });
    }
    metrics.sort_by(|a, b| a.name.cmp(&b.name));

    let mut files = Vec::with_capacity(raw.files.len());
    for (path, rule_source) in raw.files {
        files.push(parse_watch_entry(&path, rule_source)?);
    }
    files.sort_by(|a, b| (&a.dir, a.pattern.as_str()).cmp(&(&b.dir, b.pattern.as_str())));

    Ok(Config { metrics, files })
}

fn parse_watch_entry(raw_path: &str, rule_source: String) -> Result<WatchConfig, EngineError> {
    let path = Path::new(raw_path);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EngineError::ConfigParse(format!("invalid file path: {raw_path}")))?;

    if dir.to_string_lossy().contains(['*', '?', '[']) {
        return Err(EngineError::UnsupportedGlob(raw_path.to_string()));
    }

    let pattern =
        glob::Pattern::new(basename).map_err(|err| EngineError::ConfigParse(err.to_string()))?;

    Ok(WatchConfig {
        dir,
        pattern,
        rule_source: PathBuf::from(rule_source),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
