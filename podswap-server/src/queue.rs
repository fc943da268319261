//! Request queue
//!
//! Bounded FIFO of trigger signals between the webhook handler (producer)
//! and the pipeline runner (single consumer).
//!
//! Enqueueing is the only backpressure point of the service: when the queue
//! is full, [`TriggerSender::enqueue`] suspends until the runner frees a slot.
//! The webhook response is delayed for as long as that takes. If the client
//! gives up and the connection is closed, the handler future is dropped and
//! nothing is enqueued.

use podswap_core::TriggerSignal;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default number of pending triggers
pub const QUEUE_CAPACITY: usize = 50;

/// The runner has stopped and dropped its end of the queue
#[derive(Debug, Error, PartialEq, Eq)]
#[error("request queue is closed")]
pub struct QueueClosed;

/// Creates a queue with room for `capacity` pending triggers
pub fn channel(capacity: usize) -> (TriggerSender, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (TriggerSender { tx }, TriggerReceiver { rx })
}

/// Producer side, cloned into every request handler
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<TriggerSignal>,
}

impl TriggerSender {
    /// Adds a trigger, waiting for space while the queue is full
    pub async fn enqueue(&self) -> Result<(), QueueClosed> {
        self.tx.send(TriggerSignal).await.map_err(|_| QueueClosed)
    }

    /// Number of triggers waiting for the runner
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer side, owned by the pipeline runner
#[derive(Debug)]
pub struct TriggerReceiver {
    rx: mpsc::Receiver<TriggerSignal>,
}

impl TriggerReceiver {
    /// Waits for the next trigger, `None` once every sender is gone
    pub async fn next(&mut self) -> Option<TriggerSignal> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_and_depth() {
        let (tx, mut rx) = channel(3);
        tx.enqueue().await.unwrap();
        tx.enqueue().await.unwrap();
        assert_eq!(tx.queued(), 2);
        assert_eq!(tx.capacity(), 3);

        assert_eq!(rx.next().await, Some(TriggerSignal));
        assert_eq!(tx.queued(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_blocks_when_full() {
        let (tx, mut rx) = channel(1);
        tx.enqueue().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.enqueue()).await;
        assert!(blocked.is_err(), "enqueue should wait while the queue is full");
        assert_eq!(tx.queued(), 1);

        let waiter = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.enqueue().await })
        };
        assert_eq!(rx.next().await, Some(TriggerSignal));
        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert_eq!(tx.queued(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_dropped() {
        let (tx, rx) = channel(QUEUE_CAPACITY);
        drop(rx);
        assert_eq!(tx.enqueue().await, Err(QueueClosed));
    }

    #[tokio::test]
    async fn test_next_ends_when_senders_dropped() {
        let (tx, mut rx) = channel(QUEUE_CAPACITY);
        drop(tx);
        assert_eq!(rx.next().await, None);
    }
}
