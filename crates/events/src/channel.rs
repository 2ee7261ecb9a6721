//! Delivery channel abstraction.
//!
//! A **topic** is the named, durable delivery path one event family is
//! published to; each consumer owns a **queue** subscribed to one or more
//! topics. The transport promises at-least-once delivery and nothing about
//! ordering; messages that are received but not deleted become eligible for
//! redelivery, and messages past their receive budget are dead-lettered.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The named topic/queue does not exist (expected during cold-start races).
    #[error("channel not found: {0}")]
    NotFound(String),

    /// The transport rejected or failed the operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Opaque handle identifying one delivery of one message.
///
/// Deleting by receipt acknowledges that specific delivery; a later redelivery
/// of the same message carries a fresh receipt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageReceipt(pub String);

impl core::fmt::Display for MessageReceipt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One delivery of a queued message.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub receipt: MessageReceipt,
    /// Routing metadata the publisher attached alongside the body.
    pub event_type: String,
    /// Raw body (a serialized [`crate::TransportEnvelope`]).
    pub body: String,
    /// How many times this message has been delivered, this one included.
    pub receive_count: u32,
}

/// A consumer-side queue.
pub trait QueueChannel: Send + Sync {
    /// Long-poll receive up to `max` messages, blocking up to `wait`.
    ///
    /// Returns immediately when messages are available; an empty result after
    /// the full wait is normal.
    fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ChannelError>;

    /// Acknowledge one delivery, removing the message from the queue.
    fn delete(&self, receipt: &MessageReceipt) -> Result<(), ChannelError>;
}

/// Producer/consumer access to named channels.
pub trait Transport: Send + Sync {
    type Queue: QueueChannel;

    /// Whether the named topic exists.
    fn topic_exists(&self, topic: &str) -> Result<bool, ChannelError>;

    /// Create the named topic. Idempotent: creating an existing topic is a no-op.
    fn create_topic(&self, topic: &str) -> Result<(), ChannelError>;

    /// Deliver one message to every queue subscribed to `topic`.
    ///
    /// A single attempt; the caller decides what a failure means. The event
    /// type travels alongside the body as routing metadata.
    fn publish(&self, topic: &str, event_type: &str, body: &str) -> Result<(), ChannelError>;

    /// Resolve an existing queue by name.
    fn queue(&self, name: &str) -> Result<Self::Queue, ChannelError>;
}
