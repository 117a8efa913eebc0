//! CUPS spooler adapter
//!
//! Talks to the local CUPS daemon through its command line clients:
//! - `lpstat -e` lists destinations
//! - `lpstat -d` reports the default destination
//! - `lp -d <queue> -n <copies> -o raw` submits a job read from stdin

use crate::error::{PrintError, PrintResult};
use crate::spooler::{JobId, PrintSpooler};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// CUPS spooler using the `lp`/`lpstat` clients
#[derive(Debug, Clone)]
pub struct CupsSpooler {
    lp: String,
    lpstat: String,
}

impl CupsSpooler {
    pub fn new() -> Self {
        Self {
            lp: "lp".to_string(),
            lpstat: "lpstat".to_string(),
        }
    }

    /// Use alternative client binaries (e.g. absolute paths)
    pub fn with_commands(lp: impl Into<String>, lpstat: impl Into<String>) -> Self {
        Self {
            lp: lp.into(),
            lpstat: lpstat.into(),
        }
    }

    async fn lpstat(&self, arg: &str) -> PrintResult<String> {
        let output = Command::new(&self.lpstat)
            .arg(arg)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // lpstat exits non-zero when nothing is configured
            if stdout.trim().is_empty() && stderr.to_lowercase().contains("no destinations") {
                return Ok(String::new());
            }
            return Err(PrintError::Connection(format!(
                "{} {} failed: {}",
                self.lpstat,
                arg,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl Default for CupsSpooler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrintSpooler for CupsSpooler {
    async fn queues(&self) -> PrintResult<Vec<String>> {
        let out = self.lpstat("-e").await?;
        Ok(parse_queue_list(&out))
    }

    async fn default_queue(&self) -> PrintResult<Option<String>> {
        let out = self.lpstat("-d").await?;
        Ok(parse_default_queue(&out))
    }

    #[instrument(skip(self, data), fields(data_len = data.len()))]
    async fn submit(&self, queue: &str, data: &[u8], copies: u32) -> PrintResult<JobId> {
        let mut child = Command::new(&self.lp)
            .args(["-d", queue, "-n", &copies.max(1).to_string(), "-o", "raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(data).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            return Err(PrintError::Rejected {
                queue: queue.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(output = %stdout.trim(), "lp finished");

        let job = parse_request_id(&stdout).ok_or_else(|| PrintError::Rejected {
            queue: queue.to_string(),
            reason: format!("unexpected lp output: {}", stdout.trim()),
        })?;

        info!(job = %job, "Print job queued");
        Ok(job)
    }
}

/// One destination name per line
fn parse_queue_list(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `system default destination: <name>`
fn parse_default_queue(out: &str) -> Option<String> {
    out.lines().find_map(|line| {
        line.trim()
            .strip_prefix("system default destination:")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    })
}

/// `request id is <queue>-<n> (1 file(s))`
fn parse_request_id(out: &str) -> Option<JobId> {
    out.lines().find_map(|line| {
        line.trim()
            .strip_prefix("request id is ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(JobId::new)
    })
}
