// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! `RuleSet` & `FileAnalyzer` (spec §4.4) plus the process-wide compile-once
//! cache (spec §3: "A RuleSpec compiled from a given rule-source path is
//! shared by identity across all FileAnalyzers referencing that path").
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use regex::Regex;

use crate::error::EngineError;
use crate::value::{convert_capture, MetricValue};

/// The action half of a rule, bound by `crates/script`'s `ScriptHost` to a
/// callable in the embedded scripting runtime. Kept opaque here so the
/// engine never depends on the script crate.
pub trait RuleAction {
    fn call(&self, captures: &HashMap<String, MetricValue>) -> Result<(), ActionError>;
}

/// A rule action failed or panicked while running; the offending line is
/// skipped, the watcher continues (spec §7: `ActionException`).
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ActionError(pub String);

/// One compiled `(regex, action)` pair (spec §3).
pub struct RuleSpec {
    pub name: String,
    pub regex: Regex,
    pub action: Rc<dyn RuleAction>,
}

/// An ordered collection of `RuleSpec`s compiled from one rule-source file,
/// shared by `Rc` across every `FileAnalyzer` that references that source.
pub struct RuleSet {
    pub rules: Vec<Rc<RuleSpec>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rc<RuleSpec>>) -> Self {
        Self { rules }
    }
}

/// Binds one log-file target to a `RuleSet` and dispatches matched lines.
pub struct FileAnalyzer {
    pub rule_set: Rc<RuleSet>,
}

impl FileAnalyzer {
    pub fn new(rule_set: Rc<RuleSet>) -> Self {
        Self { rule_set }
    }

    /// Run every rule's regex against `line`, in load order. On a match,
    /// build a name→value capture map (numeric coercion per spec §8
    /// invariant 7) and invoke the rule's action. A failing action is
    /// logged at `warn` with the rule name and the line moves on to the
    /// next rule; it never aborts the watcher (spec §7).
    pub fn analyze_line(&self, line: &str) {
        for rule in &self.rule_set.rules {
            let Some(captures) = rule.regex.captures(line) else {
                continue;
            };
            let mut values = HashMap::new();
            for name in rule.regex.capture_names().flatten() {
                if let Some(m) = captures.name(name) {
                    values.insert(name.to_string(), convert_capture(m.as_str()));
                }
            }
            if let Err(err) = rule.action.call(&values) {
                tracing::warn!(rule = %rule.name, error = %err.0, "rule action failed, skipping line");
            }
        }
    }
}

/// Process-wide cache of compiled `RuleSet`s keyed by canonical
/// rule-source path. Loaded lazily on first reference, retained for the
/// process's lifetime (spec §3).
#[derive(Default)]
pub struct RuleSetCache {
    sets: HashMap<PathBuf, Rc<RuleSet>>,
}

impl RuleSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached `RuleSet` for `path`, invoking `load` only on a
    /// cache miss. Two calls with the same canonical path return the same
    /// `Rc`, satisfying the compile-once / shared-identity invariant.
    pub fn get_or_load(
        &mut self,
        path: &Path,
        load: impl FnOnce(&Path) -> Result<RuleSet, EngineError>,
    ) -> Result<Rc<RuleSet>, EngineError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(set) = self.sets.get(&key) {
            return Ok(set.clone());
        }
        let set = Rc::new(load(path)?);
        self.sets.insert(key, set.clone());
        Ok(set)
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
