// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! `ScriptHost`: compiles a rule-source file into a `RuleSet` (spec §3, §4.5).
//!
//! Grounded in the original Python reference's `lmetrics/rule.py`
//! (`RuleRegistry._get_rules_from_file`, `LuaRule`), which exposes the same
//! three globals — `print`, `metrics`, `rules` — to an embedded Lua
//! interpreter and then reads the populated `rules` table back out once the
//! script body has run. Rhai has no `lupa`-style `execute()`-then-inspect-
//! globals API; the equivalent here is a `Scope` pushed with `metrics` and
//! `rules`, evaluated once, then read back with `Scope::get_value`.
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use lmetrics_engine::{
    ActionError, EngineError, MetricHandle, MetricValue, RuleAction, RuleSet, RuleSpec,
};
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};

/// Loads rule sources written in the embedded scripting language.
///
/// One `ScriptHost` owns a template `Engine` with the `Rule` and `Metric`
/// types registered; each call to [`ScriptHost::load_rule_set`] clones that
/// template so the rule source's own `print()` calls can be tagged with its
/// path without the tag leaking into unrelated loads.
pub struct ScriptHost {
    template: Engine,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        register_rule_type(&mut engine);
        register_metric_type(&mut engine);
        Self { template: engine }
    }

    /// Read, compile and run the rule source at `path`, returning the
    /// `RuleSet` it assembled.
    ///
    /// A rule with an empty `regexp` is dropped with a `warn` (spec §7: a
    /// rule must have a regex to ever match anything; this mirrors the
    /// Python reference silently skipping such entries rather than
    /// crashing the whole file on one malformed rule). A rule with no
    /// `action` assigned keeps matching but does nothing, which is useful
    /// for rules added only to silence/consume lines during development.
    pub fn load_rule_set(
        &self,
        path: &Path,
        metrics: &HashMap<String, MetricHandle>,
    ) -> Result<RuleSet, EngineError> {
        if !path.is_file() {
            return Err(EngineError::RuleFileNotFound(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path)
            .map_err(|_| EngineError::RuleFileNotFound(path.to_path_buf()))?;

        let path_display = path.display().to_string();
        let mut engine = self.template.clone();
        let print_tag = path_display.clone();
        engine.on_print(move |line| tracing::info!(rule_source = %print_tag, "{line}"));
        let engine = Rc::new(engine);

        let mut scope = Scope::new();
        let mut metrics_map = Map::new();
        for (name, handle) in metrics {
            metrics_map.insert(name.as_str().into(), Dynamic::from(ScriptMetric(handle.clone())));
        }
        scope.push("metrics", metrics_map);
        scope.push("rules", Map::new());

        let ast = engine.compile(&source).map_err(|err| EngineError::RuleSyntaxError {
            path: path.to_path_buf(),
            message: clean_message(&err.to_string()),
        })?;

        engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|err| EngineError::RuleSyntaxError {
                path: path.to_path_buf(),
                message: clean_message(&err.to_string()),
            })?;

        let ast = Rc::new(ast);
        let declared_rules = scope.get_value::<Map>("rules").unwrap_or_default();

        let mut rules = Vec::with_capacity(declared_rules.len());
        for (name, value) in declared_rules {
            let name = name.to_string();
            let Some(builder) = value.try_cast::<RuleBuilder>() else {
                tracing::warn!(rule = %name, path = %path_display, "rules.{name} is not a Rule, skipping");
                continue;
            };
            if builder.regexp.is_empty() {
                tracing::warn!(rule = %name, path = %path_display, "rule has no regexp, skipping");
                continue;
            }
            let regex = regex::Regex::new(&builder.regexp).map_err(|err| EngineError::RuleSyntaxError {
                path: path.to_path_buf(),
                message: format!(": invalid regex in rule \"{name}\": {err}"),
            })?;
            let action: Rc<dyn RuleAction> = match builder.action {
                Some(fn_ptr) => Rc::new(ScriptAction { engine: engine.clone(), ast: ast.clone(), fn_ptr }),
                None => Rc::new(NoopAction),
            };
            rules.push(Rc::new(RuleSpec { name, regex, action }));
        }

        tracing::info!(count = rules.len(), path = %path_display, "loaded rule source");
        Ok(RuleSet::new(rules))
    }
}

/// Strips interpreter-internal noise from a Rhai error message the same way
/// the Python reference strips `'error loading code: [string "<python>"]'`
/// from Lua's `pcall` failures (`lmetrics/rule.py`, `RuleSyntaxError`)
/// before surfacing it to whoever wrote the rule source.
fn clean_message(raw: &str) -> String {
    const NOISE: &[&str] = &["in call to function anonymous: ", "in closure call: "];
    let mut message = raw.to_string();
    for marker in NOISE {
        message = message.replace(marker, "");
    }
    format!(": {message}")
}

/// The Rust-side value backing the `Rule` type a rule source constructs:
/// `Rule()` or `Rule("regex")`, with `.regexp` and `.action` settable
/// afterward.
#[derive(Clone, Default)]
struct RuleBuilder {
    regexp: String,
    action: Option<rhai::FnPtr>,
}

impl RuleBuilder {
    fn unpatterned() -> Self {
        Self::default()
    }

    fn with_pattern(pattern: &str) -> Self {
        Self { regexp: pattern.to_string(), action: None }
    }

    fn get_regexp(&mut self) -> String {
        self.regexp.clone()
    }

    fn set_regexp(&mut self, value: String) {
        self.regexp = value;
    }

    fn get_action(&mut self) -> Dynamic {
        match &self.action {
            Some(f) => Dynamic::from(f.clone()),
            None => Dynamic::UNIT,
        }
    }

    fn set_action(&mut self, value: rhai::FnPtr) {
        self.action = Some(value);
    }
}

fn register_rule_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<RuleBuilder>("Rule")
        .register_fn("Rule", RuleBuilder::unpatterned)
        .register_fn("Rule", RuleBuilder::with_pattern)
        .register_get_set("regexp", RuleBuilder::get_regexp, RuleBuilder::set_regexp)
        .register_get_set("action", RuleBuilder::get_action, RuleBuilder::set_action);
}

/// The Rust-side value backing `metrics.<name>` inside a rule source: a thin
/// wrapper so `prometheus` handles can be registered types in Rhai without
/// exposing the registry crate to rule authors.
#[derive(Clone)]
struct ScriptMetric(MetricHandle);

/// Rhai resolves overloads by registered arity/type, so both the bare
/// (always-by-one) and amount-taking forms are registered under the same
/// name. This is what makes the spec's documented rule-source idiom
/// (§6: `metrics.foo.inc(match.named)`, a one-argument `inc`) resolve to a
/// real function instead of silently matching nothing and erroring out of
/// the action. `inc_by`/`inc_by_labeled` stay registered too, as aliases
/// for rule sources that prefer to spell the amount form explicitly.
fn register_metric_type(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptMetric>("Metric")
        .register_fn("inc", metric_inc)
        .register_fn("inc", metric_inc_by)
        .register_fn("inc_by", metric_inc_by)
        .register_fn("set", metric_set)
        .register_fn("observe", metric_observe)
        .register_fn("inc_labeled", metric_inc_labeled)
        .register_fn("inc_labeled", metric_inc_by_labeled)
        .register_fn("inc_by_labeled", metric_inc_by_labeled)
        .register_fn("set_labeled", metric_set_labeled)
        .register_fn("observe_labeled", metric_observe_labeled);
}

fn array_to_label_values(array: Array) -> Vec<String> {
    array.into_iter().map(|d| d.clone().into_string().unwrap_or_else(|_| d.to_string())).collect()
}

fn metric_inc(m: &mut ScriptMetric) -> Result<(), Box<rhai::EvalAltResult>> {
    m.0.inc().map_err(|e| e.to_string().into())
}

fn metric_inc_by(m: &mut ScriptMetric, amount: f64) -> Result<(), Box<rhai::EvalAltResult>> {
    m.0.inc_by(amount).map_err(|e| e.to_string().into())
}

fn metric_set(m: &mut ScriptMetric, value: f64) -> Result<(), Box<rhai::EvalAltResult>> {
    m.0.set(value).map_err(|e| e.to_string().into())
}

fn metric_observe(m: &mut ScriptMetric, value: f64) -> Result<(), Box<rhai::EvalAltResult>> {
    m.0.observe(value).map_err(|e| e.to_string().into())
}

fn metric_inc_labeled(m: &mut ScriptMetric, labels: Array) -> Result<(), Box<rhai::EvalAltResult>> {
    let labels = array_to_label_values(labels);
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    m.0.inc_labeled(&refs).map_err(|e| e.to_string().into())
}

fn metric_inc_by_labeled(
    m: &mut ScriptMetric,
    amount: f64,
    labels: Array,
) -> Result<(), Box<rhai::EvalAltResult>> {
    let labels = array_to_label_values(labels);
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    m.0.inc_by_labeled(amount, &refs).map_err(|e| e.to_string().into())
}

fn metric_set_labeled(m: &mut ScriptMetric, value: f64, labels: Array) -> Result<(), Box<rhai::EvalAltResult>> {
    let labels = array_to_label_values(labels);
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    m.0.set_labeled(value, &refs).map_err(|e| e.to_string().into())
}

fn metric_observe_labeled(
    m: &mut ScriptMetric,
    value: f64,
    labels: Array,
) -> Result<(), Box<rhai::EvalAltResult>> {
    let labels = array_to_label_values(labels);
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    m.0.observe_labeled(value, &refs).map_err(|e| e.to_string().into())
}

/// Binds one rule's `action` closure to the `Engine`/`AST` it was compiled
/// from (a closure over `metrics` is meaningless without the scope it
/// closed over).
struct ScriptAction {
    engine: Rc<Engine>,
    ast: Rc<AST>,
    fn_ptr: rhai::FnPtr,
}

impl RuleAction for ScriptAction {
    fn call(&self, captures: &HashMap<String, MetricValue>) -> Result<(), ActionError> {
        let mut match_map = Map::new();
        for (name, value) in captures {
            let dyn_value = match value {
                MetricValue::Number(n) => Dynamic::from(*n),
                MetricValue::Text(s) => Dynamic::from(s.clone()),
            };
            match_map.insert(name.as_str().into(), dyn_value);
        }
        self.fn_ptr
            .call::<()>(&self.engine, &self.ast, (match_map,))
            .map_err(|err| ActionError(err.to_string()))
    }
}

struct NoopAction;

impl RuleAction for NoopAction {
    fn call(&self, _captures: &HashMap<String, MetricValue>) -> Result<(), ActionError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
