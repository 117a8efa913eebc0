//! Debounce gate
//!
//! A single swipe can reach us as a burst of identical reads. The gate
//! keeps one timestamp for the whole reader: after any admitted line,
//! everything is dropped until the window has passed, whatever its content.

use super::types::ScanEvent;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct DebounceGate {
    window: Duration,
    last_admitted: Option<Instant>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_admitted: None,
        }
    }

    /// Admit `event` unless another event was admitted less than `window` earlier
    pub fn admit(&mut self, event: &ScanEvent) -> bool {
        let open = match self.last_admitted {
            None => true,
            Some(last) => event.at.saturating_duration_since(last) >= self.window,
        };
        if open {
            self.last_admitted = Some(event.at);
        }
        open
    }
}
