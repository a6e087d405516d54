// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! `lmetrics`: the binary entry point (spec §6), grounded in the teacher's
//! `crates/mux/src/main.rs` shape — parse CLI, install a `tracing`
//! subscriber, delegate the rest to `run`, exit non-zero with a one-line
//! diagnostic on failure.
//!
//! Unlike the teacher's plain `#[tokio::main]`, this binary runs on a
//! `current_thread` runtime wrapped in a `tokio::task::LocalSet`: the
//! `RuleSet`s loaded through `lmetrics-script` hold `Rc`/Rhai state that is
//! not `Send`, so every `FileWatcher` task must stay pinned to this one
//! thread (spec §5).
mod config;
mod web;

use std::rc::Rc;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lmetrics_engine::{create_metrics, load_config, FileAnalyzer, FileWatcher, RuleSetCache, Supervisor};
use lmetrics_script::ScriptHost;
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio::task::LocalSet;

use config::{Cli, LogFormat};
use web::{build_router, AppState};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let local = LocalSet::new();
    if let Err(err) = local.run_until(run(cli)).await {
        tracing::error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.as_filter()));
    match cli.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading configuration file {}", cli.config.display()))?;
    let config = load_config(&contents)?;

    let registry = Registry::new();
    if cli.process_stats {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        registry.register(Box::new(collector)).context("registering process collector")?;
    }

    let metrics = create_metrics(&config.metrics, &registry)?;

    let script_host = ScriptHost::new();
    let mut rule_cache = RuleSetCache::new();
    let mut watchers = Vec::with_capacity(config.files.len());
    for watch_config in config.files {
        let rule_set =
            rule_cache.get_or_load(&watch_config.rule_source, |path| script_host.load_rule_set(path, &metrics))?;
        let analyzer = Rc::new(FileAnalyzer::new(rule_set));
        watchers.push(FileWatcher::new(watch_config, analyzer));
    }

    let mut supervisor = Supervisor::new(watchers);
    supervisor.start_all();

    let state = Arc::new(AppState { registry });
    let router = build_router(state);
    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!("lmetrics listening on http://{addr}");
    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown_signal()).await?;

    supervisor.stop_all().await;
    Ok(())
}

/// Waits for SIGINT (ctrl-c) or, on Unix, SIGTERM — whichever comes first.
async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler, watching SIGINT only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
