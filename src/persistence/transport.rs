//! Byte-queue transport shared by the producer and consumer sides.
//!
//! The pipeline only needs list semantics: push an opaque record onto a named channel,
//! and wait for the next record on it. Delivery is assumed at-least-once with no
//! ordering guarantee.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use log::trace;
use tokio::sync::Notify;

use crate::error_handling::types::TransportError;

#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Waits for the next record on `channel`. Returns `Ok(None)` once the transport
    /// has been shut down and the channel is drained.
    async fn receive(&self, channel: &str) -> Result<Option<Vec<u8>>, TransportError>;
}

/// In-process transport. Every holder of the same `Arc<MemoryTransport>` sees the same
/// channels, which is how several pipelines share one queue inside a single process.
#[derive(Default)]
pub struct MemoryTransport {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops accepting records and wakes every receiver.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn pending(&self, channel: &str) -> usize {
        match self.queues.lock() {
            Ok(queues) => queues.get(channel).map_or(0, |q| q.len()),
            Err(_) => 0,
        }
    }

    fn pop(&self, channel: &str) -> Result<Option<Vec<u8>>, TransportError> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        Ok(queues.get_mut(channel).and_then(|q| q.pop_front()))
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ChannelClosed);
        }
        {
            let mut queues = self
                .queues
                .lock()
                .map_err(|e| TransportError::PublishFailed(e.to_string()))?;
            queues.entry(channel.to_string()).or_default().push_back(payload);
        }
        trace!("published record on {}", channel);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, channel: &str) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking so a publish in between is not missed
            notified.as_mut().enable();

            if let Some(payload) = self.pop(channel)? {
                return Ok(Some(payload));
            }
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_then_receive_in_order() {
        let transport = MemoryTransport::new();
        transport.publish("a", b"one".to_vec()).await.unwrap();
        transport.publish("a", b"two".to_vec()).await.unwrap();
        transport.publish("b", b"other".to_vec()).await.unwrap();

        assert_eq!(transport.pending("a"), 2);
        assert_eq!(transport.receive("a").await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(transport.receive("a").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(transport.pending("b"), 1);
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let transport = Arc::new(MemoryTransport::new());
        let receiver = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.receive("chan").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.publish("chan", b"late".to_vec()).await.unwrap();

        let got = receiver.await.unwrap().unwrap();
        assert_eq!(got, Some(b"late".to_vec()));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let transport = MemoryTransport::new();
        transport.publish("chan", b"last".to_vec()).await.unwrap();
        transport.close();

        assert!(matches!(
            transport.publish("chan", b"x".to_vec()).await,
            Err(TransportError::ChannelClosed)
        ));
        assert_eq!(transport.receive("chan").await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(transport.receive("chan").await.unwrap(), None);
    }
}
