//! In-memory transport for tests/dev.
//!
//! Models the observable semantics of a topic/queue broker without any IO:
//! topic fan-out into subscribed queues, long-poll receive, at-least-once
//! redelivery of undeleted messages, and dead-lettering past a receive budget.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::channel::{ChannelError, MessageReceipt, QueueChannel, ReceivedMessage, Transport};
use crate::envelope::TransportEnvelope;

const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// A poisoned lock here only means some test thread panicked mid-operation;
/// the broker state itself stays usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct StoredMessage {
    id: u64,
    body: String,
    event_type: String,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct QueueInner {
    next_id: u64,
    next_receipt: u64,
    ready: VecDeque<StoredMessage>,
    /// Delivered but not yet deleted, keyed by receipt.
    in_flight: HashMap<String, StoredMessage>,
    dead_letters: Vec<StoredMessage>,
}

#[derive(Debug)]
struct QueueState {
    name: String,
    max_receive_count: u32,
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl QueueState {
    fn push(&self, body: String, event_type: String) {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.ready.push_back(StoredMessage {
            id,
            body,
            event_type,
            receive_count: 0,
        });
        self.available.notify_all();
    }

    /// Return undeleted deliveries to the ready queue.
    ///
    /// Stands in for the broker's visibility timeout: anything received but
    /// not deleted before the next receive call becomes deliverable again.
    fn requeue_in_flight(inner: &mut QueueInner) {
        if inner.in_flight.is_empty() {
            return;
        }
        let mut returned: Vec<StoredMessage> = inner.in_flight.drain().map(|(_, m)| m).collect();
        returned.sort_by_key(|m| m.id);
        for msg in returned {
            inner.ready.push_back(msg);
        }
    }
}

/// In-memory topic/queue transport.
///
/// Cheap to clone; clones share the same broker state.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    /// topic name -> subscribed queue names
    topics: Mutex<HashMap<String, Vec<String>>>,
    queues: Mutex<HashMap<String, Arc<QueueState>>>,
    max_receive_count: u32,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_max_receive_count(DEFAULT_MAX_RECEIVE_COUNT)
    }

    /// Override the per-message receive budget (deliveries past it dead-letter).
    pub fn with_max_receive_count(max_receive_count: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                topics: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                max_receive_count,
            }),
        }
    }

    /// Create a queue. Idempotent.
    pub fn create_queue(&self, name: &str) {
        let mut queues = lock(&self.shared.queues);
        queues.entry(name.to_string()).or_insert_with(|| {
            Arc::new(QueueState {
                name: name.to_string(),
                max_receive_count: self.shared.max_receive_count,
                inner: Mutex::new(QueueInner::default()),
                available: Condvar::new(),
            })
        });
    }

    /// Subscribe a queue to a topic's fan-out. Both must exist.
    pub fn subscribe(&self, topic: &str, queue: &str) -> Result<(), ChannelError> {
        {
            let queues = lock(&self.shared.queues);
            if !queues.contains_key(queue) {
                return Err(ChannelError::NotFound(queue.to_string()));
            }
        }
        let mut topics = lock(&self.shared.topics);
        let subscribers = topics
            .get_mut(topic)
            .ok_or_else(|| ChannelError::NotFound(topic.to_string()))?;
        if !subscribers.iter().any(|q| q == queue) {
            subscribers.push(queue.to_string());
        }
        Ok(())
    }

    /// Dead-lettered message bodies for a queue (test/ops inspection).
    pub fn dead_letters(&self, queue: &str) -> Vec<String> {
        let queues = lock(&self.shared.queues);
        match queues.get(queue) {
            Some(state) => {
                let inner = lock(&state.inner);
                inner.dead_letters.iter().map(|m| m.body.clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// Number of deliverable messages in a queue.
    pub fn queue_depth(&self, queue: &str) -> usize {
        let queues = lock(&self.shared.queues);
        match queues.get(queue) {
            Some(state) => {
                let inner = lock(&state.inner);
                inner.ready.len() + inner.in_flight.len()
            }
            None => 0,
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one in-memory queue.
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    state: Arc<QueueState>,
}

impl QueueChannel for InMemoryQueue {
    fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, ChannelError> {
        let deadline = Instant::now() + wait;
        let mut inner = lock(&self.state.inner);

        QueueState::requeue_in_flight(&mut inner);

        while inner.ready.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let (guard, timeout) = self
                .state
                .available
                .wait_timeout(inner, deadline - now)
                .map_err(|_| ChannelError::Transport("queue lock poisoned".to_string()))?;
            inner = guard;
            if timeout.timed_out() && inner.ready.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut msg) = inner.ready.pop_front() else {
                break;
            };
            msg.receive_count += 1;
            if msg.receive_count > self.state.max_receive_count {
                tracing::warn!(
                    queue = %self.state.name,
                    message_id = msg.id,
                    receive_count = msg.receive_count,
                    "message exceeded receive budget, dead-lettering"
                );
                inner.dead_letters.push(msg);
                continue;
            }
            let receipt = format!("{}:{}", msg.id, inner.next_receipt);
            inner.next_receipt += 1;
            batch.push(ReceivedMessage {
                receipt: MessageReceipt(receipt.clone()),
                event_type: msg.event_type.clone(),
                body: msg.body.clone(),
                receive_count: msg.receive_count,
            });
            inner.in_flight.insert(receipt, msg);
        }
        Ok(batch)
    }

    fn delete(&self, receipt: &MessageReceipt) -> Result<(), ChannelError> {
        let mut inner = lock(&self.state.inner);
        // Deleting an already-requeued or unknown receipt is a no-op, like a
        // real broker's expired receipt handle.
        inner.in_flight.remove(&receipt.0);
        Ok(())
    }
}

impl Transport for InMemoryTransport {
    type Queue = InMemoryQueue;

    fn topic_exists(&self, topic: &str) -> Result<bool, ChannelError> {
        Ok(lock(&self.shared.topics).contains_key(topic))
    }

    fn create_topic(&self, topic: &str) -> Result<(), ChannelError> {
        let mut topics = lock(&self.shared.topics);
        topics.entry(topic.to_string()).or_default();
        Ok(())
    }

    fn publish(&self, topic: &str, event_type: &str, body: &str) -> Result<(), ChannelError> {
        let subscribers = {
            let topics = lock(&self.shared.topics);
            topics
                .get(topic)
                .cloned()
                .ok_or_else(|| ChannelError::NotFound(topic.to_string()))?
        };

        let envelope = TransportEnvelope::notification(
            format!("arn:siren:{topic}"),
            body.to_string(),
        );
        let wrapped = serde_json::to_string(&envelope)?;

        let queues = lock(&self.shared.queues);
        for name in subscribers {
            if let Some(queue) = queues.get(&name) {
                queue.push(wrapped.clone(), event_type.to_string());
            }
        }
        Ok(())
    }

    fn queue(&self, name: &str) -> Result<Self::Queue, ChannelError> {
        let queues = lock(&self.shared.queues);
        queues
            .get(name)
            .map(|state| InMemoryQueue {
                state: state.clone(),
            })
            .ok_or_else(|| ChannelError::NotFound(name.to_string()))
    }
}
