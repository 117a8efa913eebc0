//! Print Worker
//!
//! 监听打印批次通道，在控制循环之外执行提交，
//! 这样打印机卡住时心跳不会停。

use super::dispatcher::PrintDispatcher;
use super::types::PrintBatch;
use crate::core::error::{DispatchError, DispatchResult};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Batches that may wait behind the one being printed
pub const PRINT_QUEUE_DEPTH: usize = 1;

/// Sending side used by the control loop
#[derive(Debug, Clone)]
pub struct PrintQueue {
    tx: mpsc::Sender<PrintBatch>,
}

impl PrintQueue {
    pub fn channel() -> (Self, mpsc::Receiver<PrintBatch>) {
        let (tx, rx) = mpsc::channel(PRINT_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    /// Queue a batch without waiting; a full queue drops it
    pub fn try_submit(&self, batch: PrintBatch) -> DispatchResult<()> {
        self.tx.try_send(batch).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::Busy,
            TrySendError::Closed(_) => DispatchError::WorkerStopped,
        })
    }
}

/// 打印工作者
pub struct PrintWorker {
    dispatcher: PrintDispatcher,
}

impl PrintWorker {
    pub fn new(dispatcher: PrintDispatcher) -> Self {
        Self { dispatcher }
    }

    /// 运行工作者（阻塞直到通道关闭或收到关闭信号）
    pub async fn run(self, mut batch_rx: mpsc::Receiver<PrintBatch>, shutdown: CancellationToken) {
        tracing::info!("Print worker started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Print worker received shutdown signal");
                    batch_rx.close();
                    while let Ok(batch) = batch_rx.try_recv() {
                        tracing::warn!(
                            raw = %batch.raw,
                            barcode = %batch.barcode,
                            labels = batch.labels.len(),
                            "Shutting down, queued batch not printed"
                        );
                    }
                    break;
                }
                batch = batch_rx.recv() => {
                    let Some(batch) = batch else {
                        tracing::info!("Print channel closed, print worker stopping");
                        break;
                    };
                    let results = self.dispatcher.dispatch(&batch).await;
                    let failed = results.iter().filter(|r| r.is_err()).count();
                    if failed > 0 {
                        tracing::warn!(
                            raw = %batch.raw,
                            failed,
                            total = results.len(),
                            "Batch finished with failures"
                        );
                    } else {
                        tracing::debug!(raw = %batch.raw, total = results.len(), "Batch printed");
                    }
                }
            }
        }
    }
}
