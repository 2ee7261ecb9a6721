//! Consumer worker threads.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use siren_events::{ConsumerConfig, ConsumerLoop, EffectResult, EventMessage, Transport};

/// Handle to control and join a background consumer.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns one consumer loop per queue on its own named thread.
#[derive(Debug)]
pub struct ConsumerWorker;

impl ConsumerWorker {
    /// Spawn a worker thread driving the consumer loop for `config`.
    ///
    /// The effect must be idempotent (at-least-once delivery).
    pub fn spawn<T, F>(transport: Arc<T>, config: ConsumerConfig, effect: F) -> WorkerHandle
    where
        T: Transport + Send + Sync + 'static,
        F: FnMut(&EventMessage) -> EffectResult + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let name = config.name.clone();

        let join = thread::Builder::new()
            .name(name)
            .spawn(move || ConsumerLoop::run(transport, config, shutdown_rx, effect))
            .expect("failed to spawn consumer worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use chrono::Utc;

    use siren_events::{EffectOutcome, InMemoryTransport};

    use super::*;

    #[test]
    fn worker_processes_and_shuts_down() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.create_topic("t").unwrap();
        transport.create_queue("q");
        transport.subscribe("t", "q").unwrap();

        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_effect = seen.clone();
        let handle = ConsumerWorker::spawn(
            transport.clone(),
            ConsumerConfig::new("test-worker", "q").with_wait(Duration::from_millis(20)),
            move |_| {
                seen_in_effect.fetch_add(1, Ordering::SeqCst);
                Ok(EffectOutcome::Applied)
            },
        );

        let msg = EventMessage::new("Ping", Utc::now(), &serde_json::json!({})).unwrap();
        transport
            .publish("t", "Ping", &serde_json::to_string(&msg).unwrap())
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while seen.load(Ordering::SeqCst) == 0 {
            assert!(std::time::Instant::now() < deadline, "message not processed");
            thread::sleep(Duration::from_millis(5));
        }

        handle.shutdown();
    }
}
