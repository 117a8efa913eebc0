//! Watchdog heartbeat
//!
//! Writes `1` to the watchdog device once per loop tick and `V` (magic
//! close) before a graceful exit. A fault exit releases the device without
//! `V`, so the watchdog resets the appliance. Without a configured device
//! every call is a no-op. A failed write disables the heartbeat for good;
//! the loop itself keeps running.

use crate::core::error::WatchdogError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const LIVENESS_TOKEN: &[u8] = b"1";
const DISARM_TOKEN: &[u8] = b"V";

#[derive(Debug)]
pub struct Heartbeat<W: Write = File> {
    handle: Option<W>,
    path: Option<PathBuf>,
}

impl Heartbeat<File> {
    /// Open the watchdog device; `None` disables the feature
    ///
    /// An unopenable device is logged and treated as disabled.
    pub fn open(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("Watchdog disabled");
            return Self::disabled();
        };

        match Self::try_open(path) {
            Ok(heartbeat) => {
                info!(path = %path.display(), "Watchdog enabled");
                heartbeat
            }
            Err(e) => {
                error!(error = %e, "Watchdog unavailable, continuing without it");
                Self::disabled()
            }
        }
    }

    pub fn try_open(path: &Path) -> Result<Self, WatchdogError> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| WatchdogError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            handle: Some(file),
            path: Some(path.to_path_buf()),
        })
    }
}

impl<W: Write> Heartbeat<W> {
    pub fn disabled() -> Self {
        Self {
            handle: None,
            path: None,
        }
    }

    pub fn from_writer(writer: W) -> Self {
        Self {
            handle: Some(writer),
            path: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Feed the watchdog
    pub fn tick(&mut self) {
        if let Err(e) = self.write(LIVENESS_TOKEN) {
            error!(
                path = ?self.path,
                error = %e,
                "Watchdog write failed, heartbeat disabled"
            );
            self.handle = None;
        }
    }

    /// Write the disarm token and release the device
    pub fn disarm(&mut self) {
        if !self.is_armed() {
            return;
        }
        match self.write(DISARM_TOKEN) {
            Ok(()) => info!("Watchdog disarmed"),
            Err(e) => error!(error = %e, "Watchdog disarm failed"),
        }
        self.handle = None;
    }

    /// Close the device without the disarm token
    ///
    /// The watchdog keeps counting and fires once its timeout runs out.
    pub fn release(&mut self) {
        if self.handle.take().is_some() {
            warn!(path = ?self.path, "Watchdog released armed");
        }
    }

    fn write(&mut self, token: &[u8]) -> Result<(), WatchdogError> {
        if let Some(handle) = self.handle.as_mut() {
            handle.write_all(token)?;
            handle.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared buffer so the test can inspect what was written
    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Fails every write
    struct Broken {
        attempts: Rc<RefCell<u32>>,
    }

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            *self.attempts.borrow_mut() += 1;
            Err(std::io::Error::other("device gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unset_path_is_noop() {
        let mut hb = Heartbeat::open(None);
        assert!(!hb.is_armed());
        hb.tick();
        hb.tick();
        hb.disarm();
        assert!(!hb.is_armed());
    }

    #[test]
    fn test_ticks_then_disarm() {
        let sink = Sink::default();
        let mut hb = Heartbeat::from_writer(sink.clone());

        hb.tick();
        hb.tick();
        hb.disarm();
        hb.tick();

        assert_eq!(sink.0.borrow().as_slice(), b"11V");
        assert!(!hb.is_armed());
    }

    #[test]
    fn test_release_leaves_device_armed() {
        let sink = Sink::default();
        let mut hb = Heartbeat::from_writer(sink.clone());

        hb.tick();
        hb.release();
        hb.disarm();
        hb.tick();

        assert_eq!(sink.0.borrow().as_slice(), b"1");
        assert!(!hb.is_armed());
    }

    #[test]
    fn test_write_failure_stops_further_writes() {
        let attempts = Rc::new(RefCell::new(0));
        let mut hb = Heartbeat::from_writer(Broken {
            attempts: attempts.clone(),
        });

        hb.tick();
        assert!(!hb.is_armed());
        hb.tick();
        hb.disarm();
        assert_eq!(*attempts.borrow(), 1);
    }

    #[test]
    fn test_open_missing_device_disables() {
        let hb = Heartbeat::open(Some(Path::new("/nonexistent/watchdog")));
        assert!(!hb.is_armed());
    }

    #[test]
    fn test_open_appends_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("watchdog");
        std::fs::write(&path, "").unwrap();

        let mut hb = Heartbeat::open(Some(path.as_path()));
        assert!(hb.is_armed());
        hb.tick();
        hb.disarm();

        assert_eq!(std::fs::read(&path).unwrap(), b"1V");
    }
}
