//! # kiosk-printer
//!
//! Label printer transports - low-level submission only.
//!
//! ## Scope
//!
//! This crate handles HOW a rendered label reaches a printer:
//! - Queue discovery and selection (CUPS `lpstat`)
//! - Job submission through the spooler (`lp -o raw`)
//! - Raw network printing (TCP port 9100)
//! - Spool-to-directory printing (dry run)
//!
//! Label content (WHAT to print) is rendered by the application:
//! - Template substitution → label-kiosk
//!
//! ## Example
//!
//! ```ignore
//! use kiosk_printer::{CupsSpooler, PrintSpooler, select_queue};
//!
//! let spooler = CupsSpooler::new();
//! let queue = select_queue(&spooler, &["Zebra".to_string()]).await?;
//! let job = spooler.submit(&queue, b"^XA^FDhello^FS^XZ", 2).await?;
//! println!("submitted {job}");
//! ```

mod cups;
mod error;
mod file;
mod network;
mod spooler;

// Re-exports
pub use cups::CupsSpooler;
pub use error::{PrintError, PrintResult};
pub use file::DirectoryPrinter;
pub use network::NetworkPrinter;
pub use spooler::{JobId, PrintSpooler, match_queue, select_queue};
