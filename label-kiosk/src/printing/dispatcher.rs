//! Print dispatcher
//!
//! Hands rendered labels to the spooler. The destination queue is resolved
//! once per batch; every label is then submitted on its own, so one failed
//! title does not stop the others. Nothing is retried.
//!
//! Copies normally come from the template's `numCopies` slot (`^PQ` on
//! Zebra printers), so each label is one spooler job. With
//! `spooler_copies` the count is passed to the spooler instead.

use super::types::{PrintBatch, RenderedLabel};
use crate::core::config::{DestinationConfig, PrinterConfig};
use crate::core::error::{DispatchError, DispatchResult};
use kiosk_printer::{
    CupsSpooler, DirectoryPrinter, JobId, NetworkPrinter, PrintError, PrintResult, PrintSpooler,
    select_queue,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

pub struct PrintDispatcher {
    spooler: Arc<dyn PrintSpooler>,
    queue_prefixes: Vec<String>,
    submit_timeout: Duration,
    spooler_copies: bool,
}

impl PrintDispatcher {
    pub fn new(
        spooler: Arc<dyn PrintSpooler>,
        queue_prefixes: Vec<String>,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            spooler,
            queue_prefixes,
            submit_timeout,
            spooler_copies: false,
        }
    }

    /// Ask the spooler for `copies` jobs instead of relying on the template
    pub fn with_spooler_copies(mut self, enabled: bool) -> Self {
        self.spooler_copies = enabled;
        self
    }

    /// Build the spooler named by the printer configuration
    pub fn from_config(cfg: &PrinterConfig) -> PrintResult<Self> {
        let (spooler, prefixes): (Arc<dyn PrintSpooler>, Vec<String>) = match &cfg.destination {
            DestinationConfig::Cups { queue_prefixes } => {
                (Arc::new(CupsSpooler::new()), queue_prefixes.clone())
            }
            DestinationConfig::Network { address } => (
                Arc::new(NetworkPrinter::from_addr(address)?.with_timeout(cfg.submit_timeout())),
                Vec::new(),
            ),
            DestinationConfig::Directory { path } => {
                (Arc::new(DirectoryPrinter::new(path.clone())?), Vec::new())
            }
        };
        Ok(Self::new(spooler, prefixes, cfg.submit_timeout())
            .with_spooler_copies(cfg.spooler_copies))
    }

    /// Submit every label of `batch`
    ///
    /// Returns one result per label, in label order.
    #[instrument(skip(self, batch), fields(raw = %batch.raw, barcode = %batch.barcode))]
    pub async fn dispatch(&self, batch: &PrintBatch) -> Vec<DispatchResult<JobId>> {
        let queue = match self.resolve_queue().await {
            Ok(queue) => queue,
            Err(e) => {
                error!(
                    prefixes = ?self.queue_prefixes,
                    error = %e,
                    "No print destination, dropping batch"
                );
                let reason = e.to_string();
                return batch
                    .labels
                    .iter()
                    .map(|_| Err(DispatchError::DestinationNotFound(reason.clone())))
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(batch.labels.len());
        for label in &batch.labels {
            let result = self.submit(&queue, label).await;
            match &result {
                Ok(job) => {
                    info!(queue = %queue, title = %label.title, copies = label.copies, job = %job, "Label submitted");
                }
                Err(e) => {
                    // Continue with other titles even if one fails
                    error!(queue = %queue, title = %label.title, error = %e, "Label submission failed");
                }
            }
            results.push(result);
        }
        results
    }

    async fn resolve_queue(&self) -> DispatchResult<String> {
        let lookup = select_queue(self.spooler.as_ref(), &self.queue_prefixes);
        match tokio::time::timeout(self.submit_timeout, lookup).await {
            Ok(Ok(queue)) => Ok(queue),
            Ok(Err(PrintError::QueueNotFound(msg))) => Err(DispatchError::DestinationNotFound(msg)),
            Ok(Err(e)) => Err(DispatchError::Print(e)),
            Err(_) => Err(DispatchError::Timeout {
                queue: "<lookup>".to_string(),
                after: self.submit_timeout,
            }),
        }
    }

    async fn submit(&self, queue: &str, label: &RenderedLabel) -> DispatchResult<JobId> {
        let copies = if self.spooler_copies { label.copies } else { 1 };
        let submission = self
            .spooler
            .submit(queue, label.content.as_bytes(), copies);
        match tokio::time::timeout(self.submit_timeout, submission).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DispatchError::Timeout {
                queue: queue.to_string(),
                after: self.submit_timeout,
            }),
        }
    }
}
