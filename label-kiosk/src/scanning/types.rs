//! Scanning types

use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};

/// One non-empty line delivered by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub raw: String,
    pub at: Instant,
}

impl ScanEvent {
    pub fn new(raw: impl Into<String>) -> Self {
        Self::at(raw, Instant::now())
    }

    pub fn at(raw: impl Into<String>, at: Instant) -> Self {
        Self { raw: raw.into(), at }
    }
}

/// Prefix waiting for its body scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPrefix {
    pub value: String,
    pub captured_at: Instant,
}

impl PendingPrefix {
    /// Expired once `now` is strictly past `captured_at + reset_timeout`
    pub fn is_expired(&self, now: Instant, reset_timeout: Duration) -> bool {
        now.saturating_duration_since(self.captured_at) > reset_timeout
    }
}

/// Barcode encoding of a body scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    /// Linear code, one field
    Code128,
    /// 2D code, two fields split by a separator
    Aztec,
}

impl Symbology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Code128 => "CODE128",
            Symbology::Aztec => "AZTEC",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a completed prefix/body assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeCode {
    pub symbology: Symbology,
    pub primary: String,
    pub secondary: Option<String>,
    pub prefix: Option<String>,
}

impl CompositeCode {
    /// Printed barcode value: prefix (if any) followed by the primary field
    pub fn value(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, self.primary),
            None => self.primary.clone(),
        }
    }
}
