//! Raw network printer (TCP port 9100)
//!
//! Most label printers accept raw page-description data on port 9100.
//! There is no spooler behind the socket, so the printer is exposed as a
//! single queue named after its address.

use crate::error::{PrintError, PrintResult};
use crate::spooler::{JobId, PrintSpooler};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument};

/// Network printer (TCP port 9100)
#[derive(Debug)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
    jobs: AtomicU64,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        Self::from_addr(&format!("{}:{}", host, port))
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
            jobs: AtomicU64::new(0),
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl PrintSpooler for NetworkPrinter {
    async fn queues(&self) -> PrintResult<Vec<String>> {
        Ok(vec![self.addr.to_string()])
    }

    async fn default_queue(&self) -> PrintResult<Option<String>> {
        Ok(Some(self.addr.to_string()))
    }

    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    async fn submit(&self, _queue: &str, data: &[u8], copies: u32) -> PrintResult<JobId> {
        info!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;

        // No spooler to honour a copy count, so the payload is repeated
        for _ in 0..copies.max(1) {
            stream.write_all(data).await.map_err(|e| {
                PrintError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Write failed: {}", e),
                ))
            })?;
        }

        stream.flush().await?;

        let seq = self.jobs.fetch_add(1, Ordering::Relaxed) + 1;
        let job = JobId::new(format!("{}-{}", self.addr, seq));
        info!(job = %job, "Print job sent successfully");
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.addr().port(), 9100);
    }

    #[test]
    fn test_invalid_addr() {
        let result = NetworkPrinter::from_addr("invalid");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_submit_repeats_payload_per_copy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        let job = printer.submit("ignored", b"^XA^XZ", 2).await.unwrap();
        drop(printer);

        let received = server.await.unwrap();
        assert_eq!(received, b"^XA^XZ^XA^XZ");
        assert!(job.as_str().ends_with("-1"));
    }
}
