//! Error taxonomy of the scan-to-print pipeline
//!
//! | Error | Scope | Effect on the loop |
//! |-------|-------|--------------------|
//! | [`DeviceError`] | scanner | fatal, loop stops |
//! | [`ClassifyError`] | one scanned line | logged, line dropped |
//! | [`RenderError`] | one composite code | logged, scan dropped |
//! | [`DispatchError`] | one label | logged, other labels continue |
//! | [`WatchdogError`] | heartbeat | logged, heartbeat disabled |

use kiosk_printer::PrintError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Scanner device failure (disconnect, I/O fault)
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Cannot open scanner {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Scanner {port} disconnected")]
    Disconnected { port: String },

    #[error("Scanner {port} I/O error: {source}")]
    Io {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line reader stopped")]
    ReaderStopped,
}

/// Reason a scanned line was rejected by the assembler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("Line matches neither prefix nor body pattern")]
    NoMatch,

    #[error("Body has no recognised symbology marker")]
    UnknownMarker,

    #[error("Body is missing field separator {0:?}")]
    MissingSeparator(String),
}

/// Label could not be produced for a composite code
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Cannot read label template {}: {source}", path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Required substitution missing: {0}")]
    MissingSlot(&'static str),
}

/// Label could not be handed to the printer
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Print destination not found: {0}")]
    DestinationNotFound(String),

    #[error("Print dispatcher busy, batch dropped")]
    Busy,

    #[error("Print dispatcher stopped")]
    WorkerStopped,

    #[error("Submission to {queue} timed out after {after:?}")]
    Timeout { queue: String, after: Duration },

    #[error(transparent)]
    Print(#[from] PrintError),
}

/// Watchdog device failure
#[derive(Debug, Error)]
pub enum WatchdogError {
    #[error("Cannot open watchdog {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watchdog write failed: {0}")]
    Write(#[from] std::io::Error),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type DispatchResult<T> = Result<T, DispatchError>;
