//! `siren-infra` — process wiring.
//!
//! Everything needed to run the three service cores against one transport:
//! topic/queue topology, consumer worker threads, and the composed runtime.

pub mod config;
pub mod runtime;
pub mod workers;

pub use config::Topology;
pub use runtime::SirenRuntime;
pub use workers::{ConsumerWorker, WorkerHandle};
