//! Scanner line source
//!
//! The serial device is read on a blocking thread ([`run_line_reader`]) that
//! pushes decoded lines into a bounded channel. The control loop pulls them
//! with [`LineSource::next`], which never waits longer than its timeout.

use super::types::ScanEvent;
use crate::core::error::{DeviceError, DeviceResult};
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lines buffered between the reader thread and the control loop
pub const LINE_QUEUE_DEPTH: usize = 8;

/// Longest unterminated input kept before it is thrown away
pub const MAX_LINE_BYTES: usize = 4096;

type LineMessage = DeviceResult<ScanEvent>;

/// Open the scanner's serial port
pub fn open_serial(
    port: &str,
    baud_rate: u32,
    timeout: Duration,
) -> DeviceResult<Box<dyn serialport::SerialPort>> {
    serialport::new(port, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|source| DeviceError::Open {
            port: port.to_string(),
            source,
        })
}

/// Splits a byte stream into trimmed, UTF-8 lines
///
/// `\r` and `\n` both terminate a line. Blank lines and lines that are not
/// valid UTF-8 are skipped, as is any line longer than [`MAX_LINE_BYTES`].
/// A read timeout is "no line yet", end of stream means the device went
/// away.
pub struct LineReader<R> {
    inner: R,
    port: String,
    pending: Vec<u8>,
    /// Inside an overlong line; drop bytes up to the next terminator
    discarding: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, port: impl Into<String>) -> Self {
        Self {
            inner,
            port: port.into(),
            pending: Vec::new(),
            discarding: false,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Next complete line, `None` if the device timed out first
    pub fn read_line(&mut self) -> DeviceResult<Option<String>> {
        loop {
            while let Some(pos) = self.pending.iter().position(|&b| b == b'\n' || b == b'\r') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                if let Some(text) = decode_line(&line[..pos]) {
                    return Ok(Some(text));
                }
            }

            if self.pending.len() > MAX_LINE_BYTES {
                if !self.discarding {
                    warn!(
                        port = %self.port,
                        len = self.pending.len(),
                        "Scanner line too long, discarding"
                    );
                }
                self.pending.clear();
                self.discarding = true;
            }

            let mut chunk = [0u8; 256];
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    return Err(DeviceError::Disconnected {
                        port: self.port.clone(),
                    });
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(DeviceError::Io {
                        port: self.port.clone(),
                        source,
                    });
                }
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            debug!(error = %e, len = bytes.len(), "Skipping undecodable scanner line");
            None
        }
    }
}

/// Blocking read loop
///
/// Runs until cancelled, until the consumer goes away, or until the device
/// fails. A device failure is forwarded once and ends the loop.
pub fn run_line_reader<R: Read>(
    mut reader: LineReader<R>,
    tx: mpsc::Sender<LineMessage>,
    shutdown: CancellationToken,
) {
    info!(port = %reader.port(), "Scanner reader started");

    while !shutdown.is_cancelled() {
        match reader.read_line() {
            Ok(Some(line)) => {
                debug!(raw = %line, "Scanner line");
                if tx.blocking_send(Ok(ScanEvent::new(line))).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Scanner unreadable, stopping reader");
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }

    info!(port = %reader.port(), "Scanner reader stopped");
}

/// Consumer side of the reader channel
pub struct LineSource {
    rx: mpsc::Receiver<LineMessage>,
}

impl LineSource {
    /// Create a connected sender/source pair
    pub fn channel() -> (mpsc::Sender<LineMessage>, Self) {
        let (tx, rx) = mpsc::channel(LINE_QUEUE_DEPTH);
        (tx, Self { rx })
    }

    /// Next scanned line within `timeout`
    ///
    /// `Ok(None)` when nothing arrived in time. A closed channel means the
    /// reader is gone and is reported as a device error.
    pub async fn next(&mut self, timeout: Duration) -> DeviceResult<Option<ScanEvent>> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(Ok(event))) => Ok(Some(event)),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(DeviceError::ReaderStopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Serves scripted reads, then reports timeouts forever
    struct ScriptedPort {
        reads: VecDeque<std::io::Result<Vec<u8>>>,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(std::io::Error::new(ErrorKind::TimedOut, "timeout")),
            }
        }
    }

    #[test]
    fn test_lines_are_split_trimmed_and_filtered() {
        let data = b"1234567\r\n  \n\xff\xfe\n #07 \n".to_vec();
        let mut reader = LineReader::new(Cursor::new(data), "test");

        assert_eq!(reader.read_line().unwrap().as_deref(), Some("1234567"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("#07"));
        assert!(matches!(
            reader.read_line(),
            Err(DeviceError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let port = ScriptedPort {
            reads: VecDeque::from([Ok(b"12345".to_vec()), Ok(b"67\n".to_vec())]),
        };
        let mut reader = LineReader::new(port, "test");

        // First chunk has no terminator, second completes it
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("1234567"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_overlong_line_is_dropped_with_bounded_buffer() {
        let mut data = vec![b'x'; MAX_LINE_BYTES * 3];
        data.extend_from_slice(b"\n1234567\n");
        let mut reader = LineReader::new(Cursor::new(data), "test");

        assert_eq!(reader.read_line().unwrap().as_deref(), Some("1234567"));
        assert!(reader.pending.len() <= MAX_LINE_BYTES);
        assert!(!reader.discarding);
    }

    #[test]
    fn test_timeout_is_not_an_error() {
        let port = ScriptedPort {
            reads: VecDeque::new(),
        };
        let mut reader = LineReader::new(port, "test");
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_io_fault_is_device_error() {
        let port = ScriptedPort {
            reads: VecDeque::from([Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "unplugged",
            ))]),
        };
        let mut reader = LineReader::new(port, "test");
        assert!(matches!(reader.read_line(), Err(DeviceError::Io { .. })));
    }

    #[tokio::test]
    async fn test_reader_forwards_lines_then_device_error() {
        let (tx, mut source) = LineSource::channel();
        let reader = LineReader::new(Cursor::new(b"#07\n1234567\n".to_vec()), "test");
        let shutdown = CancellationToken::new();

        let handle = tokio::task::spawn_blocking(move || run_line_reader(reader, tx, shutdown));

        let timeout = Duration::from_secs(1);
        assert_eq!(source.next(timeout).await.unwrap().unwrap().raw, "#07");
        assert_eq!(source.next(timeout).await.unwrap().unwrap().raw, "1234567");
        assert!(matches!(
            source.next(timeout).await,
            Err(DeviceError::Disconnected { .. })
        ));
        handle.await.unwrap();
        assert!(matches!(
            source.next(timeout).await,
            Err(DeviceError::ReaderStopped)
        ));
    }

    #[tokio::test]
    async fn test_next_times_out_with_none() {
        let (_tx, mut source) = LineSource::channel();
        let got = source.next(Duration::from_millis(20)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_reader_stops_on_cancel() {
        let (tx, _source) = LineSource::channel();
        let port = ScriptedPort {
            reads: VecDeque::new(),
        };
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let reader = LineReader::new(port, "test");
        tokio::task::spawn_blocking(move || run_line_reader(reader, tx, shutdown))
            .await
            .unwrap();
    }
}
