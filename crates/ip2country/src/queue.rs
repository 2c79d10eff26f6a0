//! Bounded hand-off queue carrying batches from the reader to the workers.
//!
//! The reader is the only producer. Workers share a single receiver and
//! whichever is idle first takes the next batch. Closing the queue is the only
//! termination signal: [`BatchSender::close`] consumes the sender, so it can
//! only happen once and only after the final send.

use crate::{
    batch::Batch,
    error::{Error, Result},
};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Creates a queue holding at most `depth` batches (minimum 1) in flight.
pub fn bounded(depth: usize) -> (BatchSender, BatchReceiver) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (
        BatchSender { tx },
        BatchReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producing half of the queue. Not `Clone`: there is exactly one reader.
#[derive(Debug)]
pub struct BatchSender {
    tx: mpsc::Sender<Batch>,
}

impl BatchSender {
    /// Enqueues a batch, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if every receiver has been dropped.
    pub async fn send(&self, batch: Batch) -> Result<()> {
        self.tx.send(batch).await.map_err(|_| Error::QueueClosed)
    }

    /// Closes the queue. Workers drain what is already queued and then stop.
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Consuming half of the queue, cloned once per worker.
#[derive(Debug, Clone)]
pub struct BatchReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
}

impl BatchReceiver {
    /// Waits for the next batch.
    ///
    /// Returns `None` once the queue is closed and drained. Cancel safe: a
    /// batch is never lost if this future is dropped before completing.
    pub async fn recv(&self) -> Option<Batch> {
        self.rx.lock().await.recv().await
    }
}
