//! Scan-to-print control loop
//!
//! One tick:
//! 1. feed the watchdog
//! 2. expire a stale prefix
//! 3. wait up to the scanner timeout for a line
//! 4. debounce → assemble → render → queue for printing
//!
//! Only one composite code is handled at a time; printing itself happens on
//! the print worker so a slow printer cannot stall the heartbeat.

use super::config::{Config, ConfigResult, TitleCopies};
use super::error::{ClassifyError, DeviceResult, DispatchError, RenderError};
use crate::printing::{LabelRenderer, PrintBatch, PrintQueue, TemplateCache};
use crate::scanning::{Assembly, CompositeCode, DebounceGate, LineSource, ScanAssembler, ScanEvent};
use crate::watchdog::Heartbeat;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to one scanned line
#[derive(Debug)]
pub enum ScanOutcome {
    /// Dropped by the debounce gate
    Suppressed,
    /// Matched neither pattern, or the body could not be decoded
    Rejected(ClassifyError),
    /// Prefix stored, waiting for a body
    PrefixHeld(String),
    /// Labels rendered and queued
    Queued { barcode: String, labels: usize },
    /// Template problem; the code was dropped
    RenderFailed(RenderError),
    /// Print worker could not take the batch
    DispatchFailed(DispatchError),
}

pub struct Kiosk {
    gate: DebounceGate,
    assembler: ScanAssembler,
    renderer: LabelRenderer,
    templates: TemplateCache,
    template_path: PathBuf,
    titles: TitleCopies,
    heartbeat: Heartbeat,
    print_queue: PrintQueue,
    poll_timeout: Duration,
}

impl Kiosk {
    pub fn new(
        config: &Config,
        renderer: LabelRenderer,
        heartbeat: Heartbeat,
        print_queue: PrintQueue,
    ) -> ConfigResult<Self> {
        Ok(Self {
            gate: DebounceGate::new(config.scanner.debounce()),
            assembler: ScanAssembler::from_config(&config.barcode, config.scanner.reset_timeout())?,
            renderer,
            templates: TemplateCache::new(),
            template_path: config.label.template.clone(),
            titles: config.label.titles.clone(),
            heartbeat,
            print_queue,
            poll_timeout: config.scanner.timeout(),
        })
    }

    /// Run until cancelled or until the scanner fails
    pub async fn run(&mut self, mut source: LineSource, shutdown: CancellationToken) -> DeviceResult<()> {
        info!(
            template = %self.template_path.display(),
            titles = self.titles.len(),
            "Scan loop started"
        );

        let result = loop {
            self.tick(Instant::now());

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scan loop received shutdown signal");
                    break Ok(());
                }
                next = source.next(self.poll_timeout) => match next {
                    Ok(Some(event)) => {
                        self.handle_scan(event);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(error = %e, "Scanner lost, stopping scan loop");
                        break Err(e);
                    }
                }
            }
        };

        // A fault leaves the watchdog armed
        match result {
            Ok(()) => self.heartbeat.disarm(),
            Err(_) => self.heartbeat.release(),
        }
        result
    }

    /// Per-tick housekeeping, independent of input
    pub fn tick(&mut self, now: Instant) {
        self.heartbeat.tick();
        self.assembler.expire(now);
    }

    /// Push one scanned line through the pipeline
    pub fn handle_scan(&mut self, event: ScanEvent) -> ScanOutcome {
        if !self.gate.admit(&event) {
            debug!(raw = %event.raw, "Scan suppressed by debounce window");
            return ScanOutcome::Suppressed;
        }

        match self.assembler.feed(&event) {
            Ok(Assembly::PrefixHeld(prefix)) => {
                info!(raw = %event.raw, prefix = %prefix, "Prefix scanned");
                ScanOutcome::PrefixHeld(prefix)
            }
            Ok(Assembly::Completed(code)) => self.print(&event.raw, &code),
            Err(reason) => {
                warn!(raw = %event.raw, reason = %reason, "Scan rejected");
                ScanOutcome::Rejected(reason)
            }
        }
    }

    fn print(&mut self, raw: &str, code: &CompositeCode) -> ScanOutcome {
        let barcode = code.value();
        info!(raw = %raw, barcode = %barcode, symbology = %code.symbology, "Code assembled");

        let labels = match self
            .templates
            .get(&self.template_path)
            .and_then(|template| self.renderer.render(code, &template, &self.titles))
        {
            Ok(labels) => labels,
            Err(e) => {
                error!(
                    raw = %raw,
                    template = %self.template_path.display(),
                    error = %e,
                    "Cannot render label, scan dropped"
                );
                return ScanOutcome::RenderFailed(e);
            }
        };

        let count = labels.len();
        let batch = PrintBatch {
            raw: raw.to_string(),
            barcode: barcode.clone(),
            labels,
        };

        match self.print_queue.try_submit(batch) {
            Ok(()) => ScanOutcome::Queued {
                barcode,
                labels: count,
            },
            Err(e) => {
                error!(raw = %raw, barcode = %barcode, error = %e, "Cannot queue labels");
                ScanOutcome::DispatchFailed(e)
            }
        }
    }
}
