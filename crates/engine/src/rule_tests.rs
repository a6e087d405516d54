// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

use std::cell::RefCell;
use std::rc::Rc;

use super::*;

struct RecordingAction {
    calls: Rc<RefCell<Vec<HashMap<String, MetricValue>>>>,
}

impl RuleAction for RecordingAction {
    fn call(&self, captures: &HashMap<String, MetricValue>) -> Result<(), ActionError> {
        self.calls.borrow_mut().push(captures.clone());
        Ok(())
    }
}

struct FailingAction;

impl RuleAction for FailingAction {
    fn call(&self, _captures: &HashMap<String, MetricValue>) -> Result<(), ActionError> {
        Err(ActionError("boom".to_string()))
    }
}

fn rule_spec(name: &str, pattern: &str, action: Rc<dyn RuleAction>) -> Rc<RuleSpec> {
    Rc::new(RuleSpec {
        name: name.to_string(),
        regex: Regex::new(pattern).unwrap(),
        action,
    })
}

#[test]
fn matching_rule_invokes_action_with_numeric_coercion() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let action = Rc::new(RecordingAction { calls: calls.clone() });
    let rule = rule_spec("v", r"^foo(?P<v>.*)foo$", action);
    let analyzer = FileAnalyzer::new(Rc::new(RuleSet::new(vec![rule])));

    analyzer.analyze_line("foobarfoo");
    analyzer.analyze_line("bazfoo");
    analyzer.analyze_line("foobazfoo");

    let recorded = calls.borrow();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].get("v"), Some(&MetricValue::Text("bar".to_string())));
    assert_eq!(recorded[1].get("v"), Some(&MetricValue::Text("baz".to_string())));
}

#[test]
fn entire_numeric_capture_is_coerced_to_a_number() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let action = Rc::new(RecordingAction { calls: calls.clone() });
    let rule = rule_spec("n", r"^count=(?P<n>\d+)$", action);
    let analyzer = FileAnalyzer::new(Rc::new(RuleSet::new(vec![rule])));

    analyzer.analyze_line("count=42");

    assert_eq!(calls.borrow()[0].get("n"), Some(&MetricValue::Number(42.0)));
}

#[test]
fn rules_run_in_load_order_and_all_matching_rules_fire() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let first = rule_spec("first", "a", Rc::new(RecordingAction { calls: calls.clone() }));
    let second = rule_spec("second", "a", Rc::new(RecordingAction { calls: calls.clone() }));
    let analyzer = FileAnalyzer::new(Rc::new(RuleSet::new(vec![first, second])));

    analyzer.analyze_line("a");

    assert_eq!(calls.borrow().len(), 2);
}

#[test]
fn failing_action_is_swallowed_and_does_not_stop_remaining_rules() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let failing = rule_spec("failing", "x", Rc::new(FailingAction));
    let recording = rule_spec("recording", "x", Rc::new(RecordingAction { calls: calls.clone() }));
    let analyzer = FileAnalyzer::new(Rc::new(RuleSet::new(vec![failing, recording])));

    analyzer.analyze_line("x");

    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn rule_set_cache_shares_rule_set_identity_across_analyzers() {
    let mut cache = RuleSetCache::new();
    let mut load_count = 0;
    let path = Path::new("/etc/lmetrics/rules.rhai");

    let first = cache
        .get_or_load(path, |_| {
            load_count += 1;
            Ok(RuleSet::new(vec![]))
        })
        .unwrap();
    let second = cache
        .get_or_load(path, |_| {
            load_count += 1;
            Ok(RuleSet::new(vec![]))
        })
        .unwrap();

    assert_eq!(load_count, 1, "load callback must only run on a cache miss");
    assert!(Rc::ptr_eq(&first, &second));
}
