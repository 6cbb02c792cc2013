//! Message queue capability.
//!
//! A thin send/receive surface over an external queue. Delivery semantics
//! (at-least-once, visibility timeouts) belong to the provider; each message
//! returned by receive has already been acknowledged exactly once.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod service_bus;

pub use service_bus::{ServiceBusConfig, ServiceBusQueue};

/// A message pulled from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
}

/// Send/receive capability over an external message queue
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue one message
    async fn send(&self, content: &str) -> Result<()>;

    /// Dequeue up to max_count messages, waiting at most max_wait per
    /// message
    async fn receive(&self, max_count: usize, max_wait: Duration) -> Result<Vec<QueueMessage>>;
}
