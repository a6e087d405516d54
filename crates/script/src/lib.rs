// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! Rhai-embedded rule-source loader.
//!
//! The engine crate defines `RuleAction` and `RuleSet` as opaque seams; this
//! crate is the one collaborator that fills them in, the way the original
//! system's Lua rule-source layer did. A rule source is a small Rhai
//! program that populates two scope-level globals, `metrics` (one entry per
//! configured metric, pre-bound so the script never has to touch the
//! `prometheus` registry directly) and `rules` (the script's own, starting
//! empty), then assigns `Rule(...)` objects with a compiled-at-load-time
//! `regexp` and a closure `action` bound to the enclosing scope.

mod host;

pub use host::ScriptHost;
