//! Generic consumer loop.
//!
//! One parameterized loop serves every consumer in the system: it is given a
//! queue name, a transport, and a typed effect function, and drives the
//! receive → validate → apply → acknowledge protocol. Delivery is
//! at-least-once, so the effect function must be idempotent.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::channel::{QueueChannel, ReceivedMessage, Transport};
use crate::envelope::TransportEnvelope;
use crate::message::EventMessage;

/// Outcome of applying one event message.
#[derive(Debug, PartialEq, Eq)]
pub enum EffectOutcome {
    /// Local effects were applied; acknowledge the message.
    Applied,
    /// Message understood but intentionally ignored; acknowledge it.
    Skipped(&'static str),
}

/// Failure while applying one event message.
#[derive(Debug)]
pub enum EffectError {
    /// The message can never succeed (malformed payload, unparseable id).
    /// It is acknowledged and dropped.
    Discard(String),
    /// Transient failure. The message is left on the queue for redelivery
    /// and eventual dead-lettering.
    Retry(String),
}

impl EffectError {
    pub fn discard(reason: impl core::fmt::Display) -> Self {
        Self::Discard(reason.to_string())
    }

    pub fn retry(reason: impl core::fmt::Display) -> Self {
        Self::Retry(reason.to_string())
    }
}

pub type EffectResult = Result<EffectOutcome, EffectError>;

/// Consumer loop configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Name for logging.
    pub name: String,
    /// Queue to receive from.
    pub queue: String,
    /// Max messages per receive.
    pub batch_size: usize,
    /// Long-poll wait per receive.
    pub wait: Duration,
    /// Pause after a receive failure.
    pub error_backoff: Duration,
    /// Pause between attempts to resolve the queue at startup.
    pub init_backoff: Duration,
}

impl ConsumerConfig {
    pub fn new(name: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: queue.into(),
            batch_size: 10,
            wait: Duration::from_secs(20),
            error_backoff: Duration::from_secs(5),
            init_backoff: Duration::from_secs(5),
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self.init_backoff = backoff;
        self
    }
}

/// Long-running polling loop for one event family.
#[derive(Debug)]
pub struct ConsumerLoop;

impl ConsumerLoop {
    /// Run until shutdown is signalled (send on the channel, or drop of the
    /// sender).
    ///
    /// The effect function is invoked once per successfully decoded message;
    /// its [`EffectResult`] decides between acknowledge, discard, and
    /// redelivery.
    pub fn run<T, F>(
        transport: Arc<T>,
        config: ConsumerConfig,
        shutdown: mpsc::Receiver<()>,
        mut effect: F,
    ) where
        T: Transport,
        F: FnMut(&EventMessage) -> EffectResult,
    {
        let Some(queue) = Self::resolve_queue(&transport, &config, &shutdown) else {
            info!(consumer = %config.name, "consumer stopped before queue became available");
            return;
        };

        info!(consumer = %config.name, queue = %config.queue, "consumer started");

        'outer: loop {
            if shutdown_requested(&shutdown) {
                break;
            }

            match queue.receive(config.batch_size, config.wait) {
                Ok(batch) => {
                    if batch.is_empty() {
                        continue;
                    }
                    debug!(consumer = %config.name, count = batch.len(), "received messages");
                    for message in &batch {
                        if shutdown_requested(&shutdown) {
                            break 'outer;
                        }
                        Self::process_message(&queue, &config, message, &mut effect);
                    }
                }
                Err(err) => {
                    error!(consumer = %config.name, error = %err, "error receiving messages");
                    if wait_or_shutdown(&shutdown, config.error_backoff) {
                        break;
                    }
                }
            }
        }

        info!(consumer = %config.name, "consumer stopped");
    }

    /// Resolve the queue by name, retrying indefinitely while it does not
    /// exist yet (expected during cold-start races between services).
    fn resolve_queue<T: Transport>(
        transport: &Arc<T>,
        config: &ConsumerConfig,
        shutdown: &mpsc::Receiver<()>,
    ) -> Option<T::Queue> {
        loop {
            if shutdown_requested(shutdown) {
                return None;
            }
            match transport.queue(&config.queue) {
                Ok(queue) => {
                    info!(consumer = %config.name, queue = %config.queue, "initialized queue");
                    return Some(queue);
                }
                Err(err) => {
                    warn!(
                        consumer = %config.name,
                        queue = %config.queue,
                        error = %err,
                        "queue not available yet, will retry"
                    );
                    if wait_or_shutdown(shutdown, config.init_backoff) {
                        return None;
                    }
                }
            }
        }
    }

    fn process_message<Q, F>(
        queue: &Q,
        config: &ConsumerConfig,
        message: &ReceivedMessage,
        effect: &mut F,
    ) where
        Q: QueueChannel,
        F: FnMut(&EventMessage) -> EffectResult,
    {
        let event = match TransportEnvelope::open(&message.body) {
            Ok(event) => event,
            Err(err) => {
                warn!(consumer = %config.name, error = %err, "malformed message, deleting");
                Self::delete(queue, config, message);
                return;
            }
        };

        match effect(&event) {
            Ok(EffectOutcome::Applied) => {
                info!(
                    consumer = %config.name,
                    event_type = %event.event_type,
                    "processed event"
                );
                Self::delete(queue, config, message);
            }
            Ok(EffectOutcome::Skipped(reason)) => {
                info!(
                    consumer = %config.name,
                    event_type = %event.event_type,
                    reason,
                    "skipped event"
                );
                Self::delete(queue, config, message);
            }
            Err(EffectError::Discard(reason)) => {
                warn!(
                    consumer = %config.name,
                    event_type = %event.event_type,
                    reason = %reason,
                    "unprocessable event, deleting"
                );
                Self::delete(queue, config, message);
            }
            Err(EffectError::Retry(reason)) => {
                error!(
                    consumer = %config.name,
                    event_type = %event.event_type,
                    receive_count = message.receive_count,
                    reason = %reason,
                    "effect failed, leaving message for redelivery"
                );
            }
        }
    }

    fn delete<Q: QueueChannel>(queue: &Q, config: &ConsumerConfig, message: &ReceivedMessage) {
        if let Err(err) = queue.delete(&message.receipt) {
            error!(consumer = %config.name, error = %err, "error deleting message from queue");
        }
    }
}

fn shutdown_requested(shutdown: &mpsc::Receiver<()>) -> bool {
    matches!(
        shutdown.try_recv(),
        Ok(()) | Err(mpsc::TryRecvError::Disconnected)
    )
}

/// Sleep for `duration`, waking early on shutdown. Returns true on shutdown.
fn wait_or_shutdown(shutdown: &mpsc::Receiver<()>, duration: Duration) -> bool {
    !matches!(
        shutdown.recv_timeout(duration),
        Err(mpsc::RecvTimeoutError::Timeout)
    )
}
