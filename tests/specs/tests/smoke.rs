// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! End-to-end smoke tests that spawn the real `lmetrics` binary against a
//! real config, rule source, and log file, then scrape it over HTTP.
use std::time::Duration;

use lmetrics_specs::LmetricsProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn homepage_serves_html() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("app.log");
    let rule_path = dir.path().join("rules.rhai");
    std::fs::write(&log_path, "")?;
    std::fs::write(&rule_path, "")?;

    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!("metrics: {{}}\nfiles:\n  {}: {}\n", log_path.display(), rule_path.display()),
    )?;

    let lmetrics = LmetricsProcess::start(&config_path)?;
    lmetrics.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!("{}/", lmetrics.base_url())).await?;
    assert!(resp.status().is_success());
    let content_type = resp.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or_default();
    assert!(content_type.starts_with("text/html"));
    let body = resp.text().await?;
    assert!(body.contains("lmetrics"));

    Ok(())
}

#[tokio::test]
async fn metrics_endpoint_reflects_rule_matched_log_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("app.log");
    let rule_path = dir.path().join("rules.rhai");
    std::fs::write(&log_path, "")?;
    std::fs::write(
        &rule_path,
        "rules.errors = Rule(\"ERROR\");\nrules.errors.action = |m| {\n    metrics.error_count.inc();\n};\n",
    )?;

    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "metrics:\n  error_count:\n    type: counter\n    description: number of ERROR lines\nfiles:\n  {}: {}\n",
            log_path.display(),
            rule_path.display()
        ),
    )?;

    let lmetrics = LmetricsProcess::start(&config_path)?;
    lmetrics.wait_healthy(TIMEOUT).await?;

    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().append(true).open(&log_path)?;
    writeln!(f, "2026-07-29 12:00:00 ERROR disk full")?;
    writeln!(f, "2026-07-29 12:00:01 INFO all fine")?;
    writeln!(f, "2026-07-29 12:00:02 ERROR disk still full")?;
    drop(f);

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("error_count never reached 2 in /metrics output");
        }
        let body = lmetrics.metrics_text().await?;
        if body.lines().any(|line| line.trim() == "error_count 2") {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn missing_rule_file_exits_nonzero_before_binding() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("app.log");
    std::fs::write(&log_path, "")?;

    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!("metrics: {{}}\nfiles:\n  {}: {}\n", log_path.display(), dir.path().join("missing.rhai").display()),
    )?;

    let mut lmetrics = LmetricsProcess::start(&config_path)?;
    let status = lmetrics.wait_exit(TIMEOUT).await?;
    assert!(!status.success());

    Ok(())
}

#[tokio::test]
async fn unknown_metric_type_exits_nonzero_before_binding() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        "metrics:\n  bogus:\n    type: not_a_real_type\n    description: nope\nfiles: {}\n",
    )?;

    let mut lmetrics = LmetricsProcess::start(&config_path)?;
    let status = lmetrics.wait_exit(TIMEOUT).await?;
    assert!(!status.success());

    Ok(())
}
