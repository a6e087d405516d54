// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `lmetrics` binary as a subprocess against a real YAML
//! config, a real rule-source file, and a real log file on disk, then
//! drives it over HTTP — mirroring the teacher's `tests/specs` harness
//! (`coop-specs`) but scoped to the one transport this system has.
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `lmetrics` binary.
pub fn lmetrics_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("lmetrics")
}

/// Find a free TCP port by binding to :0 then releasing it.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `lmetrics` process that is killed on drop.
pub struct LmetricsProcess {
    child: Child,
    port: u16,
}

impl LmetricsProcess {
    /// Spawn `lmetrics` against `config_path` on a freshly allocated port.
    pub fn start(config_path: &Path) -> anyhow::Result<Self> {
        let binary = lmetrics_binary();
        anyhow::ensure!(binary.exists(), "lmetrics binary not found at {}", binary.display());
        let port = free_port()?;

        let child = Command::new(&binary)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("--log-level")
            .arg("warn")
            .arg("--log-format")
            .arg("text")
            .arg(config_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll `/` until it responds successfully, or fail after `timeout`.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("lmetrics did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn metrics_text(&self) -> anyhow::Result<String> {
        let url = format!("{}/metrics", self.base_url());
        Ok(reqwest::get(&url).await?.text().await?)
    }

    /// Wait for the process to exit on its own within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("lmetrics did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for LmetricsProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
