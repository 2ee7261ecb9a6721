//! `siren-events` — the event publication/consumption protocol.
//!
//! Services never share state directly; they exchange integration events over
//! named channels (topic fan-out into per-consumer queues). Delivery is
//! **at-least-once** and unordered, so every effect applied by a consumer must
//! be idempotent.
//!
//! The pieces:
//! - [`EventMessage`] / [`TransportEnvelope`]: the wire contract.
//! - [`contracts`]: the typed payloads shared by all three services.
//! - [`Transport`] / [`QueueChannel`]: the delivery seam (a real broker plugs
//!   in here; [`InMemoryTransport`] models the same semantics for tests/dev).
//! - [`EventPublisher`]: best-effort, error-swallowing publication.
//! - [`ConsumerLoop`]: the single generic long-poll/ack/redeliver loop that
//!   every consumer in the system runs.

pub mod channel;
pub mod consumer;
pub mod contracts;
pub mod envelope;
pub mod in_memory;
pub mod message;
pub mod publisher;

pub use channel::{ChannelError, MessageReceipt, QueueChannel, ReceivedMessage, Transport};
pub use consumer::{ConsumerConfig, ConsumerLoop, EffectError, EffectOutcome, EffectResult};
pub use envelope::TransportEnvelope;
pub use in_memory::InMemoryTransport;
pub use message::{EventMessage, IntegrationEvent};
pub use publisher::EventPublisher;
