//! Directory printer
//!
//! Writes each job to a file instead of a device. Used for dry runs and
//! for inspecting rendered labels without hardware.

use crate::error::{PrintError, PrintResult};
use crate::spooler::{JobId, PrintSpooler};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument};

/// Queue name reported by [`DirectoryPrinter`]
const QUEUE_NAME: &str = "directory";

/// Printer that spools jobs into a directory
#[derive(Debug)]
pub struct DirectoryPrinter {
    dir: PathBuf,
    jobs: AtomicU64,
}

impl DirectoryPrinter {
    /// Create a printer writing into `dir` (created if missing)
    pub fn new(dir: impl Into<PathBuf>) -> PrintResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            PrintError::InvalidConfig(format!("Cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            jobs: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl PrintSpooler for DirectoryPrinter {
    async fn queues(&self) -> PrintResult<Vec<String>> {
        Ok(vec![QUEUE_NAME.to_string()])
    }

    async fn default_queue(&self) -> PrintResult<Option<String>> {
        Ok(Some(QUEUE_NAME.to_string()))
    }

    #[instrument(skip(self, data), fields(dir = %self.dir.display(), data_len = data.len()))]
    async fn submit(&self, queue: &str, data: &[u8], copies: u32) -> PrintResult<JobId> {
        let seq = self.jobs.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{:06}-{}-x{}.prn", seq, sanitize(queue), copies.max(1));
        tokio::fs::write(self.dir.join(&name), data).await?;

        info!(file = %name, "Label spooled to directory");
        Ok(JobId::new(name))
    }
}

fn sanitize(queue: &str) -> String {
    queue
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_writes_numbered_files() {
        let tmp = tempfile::tempdir().unwrap();
        let printer = DirectoryPrinter::new(tmp.path().join("spool")).unwrap();

        let first = printer.submit("directory", b"one", 1).await.unwrap();
        let second = printer.submit("Zebra ZD/420", b"two", 3).await.unwrap();

        assert_eq!(first.as_str(), "000001-directory-x1.prn");
        assert_eq!(second.as_str(), "000002-Zebra_ZD_420-x3.prn");

        let content = std::fs::read(printer.dir().join(second.as_str())).unwrap();
        assert_eq!(content, b"two");
    }
}
