//! Spooler abstraction shared by all transports
//!
//! A spooler exposes named queues and accepts raw jobs. Transports without
//! real queues (network, directory) expose a single synthetic one.

use crate::error::{PrintError, PrintResult};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, instrument};

/// Identifier handed back by the spooler for a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for print spoolers
#[async_trait]
pub trait PrintSpooler: Send + Sync {
    /// Names of the queues currently available
    async fn queues(&self) -> PrintResult<Vec<String>>;

    /// The spooler's default queue, if one is set
    async fn default_queue(&self) -> PrintResult<Option<String>>;

    /// Submit raw label data to `queue`, printed `copies` times
    async fn submit(&self, queue: &str, data: &[u8], copies: u32) -> PrintResult<JobId>;
}

/// Find the first queue whose name starts with one of `prefixes`
///
/// Comparison is case-insensitive. Prefixes are tried in order, so the
/// first configured printer family wins when several are attached.
pub fn match_queue<'a>(queues: &'a [String], prefixes: &[String]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| {
        let prefix = prefix.to_uppercase();
        queues
            .iter()
            .find(|q| q.to_uppercase().starts_with(&prefix))
            .map(String::as_str)
    })
}

/// Resolve the destination queue for a submission batch
///
/// With no prefixes configured the spooler's default queue is used.
#[instrument(skip(spooler))]
pub async fn select_queue(
    spooler: &dyn PrintSpooler,
    prefixes: &[String],
) -> PrintResult<String> {
    if prefixes.is_empty() {
        return spooler
            .default_queue()
            .await?
            .ok_or_else(|| PrintError::QueueNotFound("no default queue".to_string()));
    }

    let queues = spooler.queues().await?;
    debug!(?queues, "Available queues");

    match_queue(&queues, prefixes)
        .map(str::to_string)
        .ok_or_else(|| {
            PrintError::QueueNotFound(format!(
                "none of {:?} among {:?}",
                prefixes, queues
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSpooler {
        queues: Vec<String>,
        default: Option<String>,
    }

    #[async_trait]
    impl PrintSpooler for FixedSpooler {
        async fn queues(&self) -> PrintResult<Vec<String>> {
            Ok(self.queues.clone())
        }

        async fn default_queue(&self) -> PrintResult<Option<String>> {
            Ok(self.default.clone())
        }

        async fn submit(&self, _queue: &str, _data: &[u8], _copies: u32) -> PrintResult<JobId> {
            Ok(JobId::new("1"))
        }
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_queue_case_insensitive() {
        let queues = names(&["HP_LaserJet", "zebra_zd420"]);
        assert_eq!(match_queue(&queues, &names(&["Zebra"])), Some("zebra_zd420"));
    }

    #[test]
    fn test_match_queue_prefix_order() {
        let queues = names(&["Zebra_GK420", "Brother_QL"]);
        assert_eq!(
            match_queue(&queues, &names(&["Brother", "Zebra"])),
            Some("Brother_QL")
        );
    }

    #[test]
    fn test_match_queue_substring_is_not_prefix() {
        let queues = names(&["Office_Zebra"]);
        assert_eq!(match_queue(&queues, &names(&["Zebra"])), None);
    }

    #[tokio::test]
    async fn test_select_queue_falls_back_to_default() {
        let spooler = FixedSpooler {
            queues: names(&["A", "B"]),
            default: Some("B".to_string()),
        };
        assert_eq!(select_queue(&spooler, &[]).await.unwrap(), "B");
    }

    #[tokio::test]
    async fn test_select_queue_not_found() {
        let spooler = FixedSpooler {
            queues: names(&["HP"]),
            default: None,
        };
        let err = select_queue(&spooler, &names(&["Zebra"])).await.unwrap_err();
        assert!(matches!(err, PrintError::QueueNotFound(_)));

        let err = select_queue(&spooler, &[]).await.unwrap_err();
        assert!(matches!(err, PrintError::QueueNotFound(_)));
    }
}
