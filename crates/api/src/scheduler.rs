//! Background pipeline dispatch.
//!
//! A fixed pool of worker tasks drains a queue of image ids; runs for
//! different ids proceed in parallel while the record store's
//! compare-and-set claim keeps each id single-writer. Uploads never block
//! on a saturated pool - they enqueue and return.
//!
//! Shutdown closes the queue, lets workers drain in-flight and queued runs
//! up to a timeout, then cancels whatever is left. Once shutdown has begun,
//! new schedule calls are refused.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::pipeline::Pipeline;

/// Error returned when scheduling after shutdown has begun.
#[derive(Debug, thiserror::Error)]
#[error("pipeline scheduler is shut down")]
pub struct SchedulerClosed;

pub struct PipelineScheduler {
    sender: Mutex<Option<mpsc::UnboundedSender<Uuid>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl PipelineScheduler {
    /// Spawn `worker_count` workers over a shared queue.
    pub fn start(pipeline: Arc<Pipeline>, worker_count: usize) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Uuid>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let cancel = CancellationToken::new();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let pipeline = Arc::clone(&pipeline);
            let rx = Arc::clone(&rx);
            let cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let id = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            message = rx.recv() => match message {
                                Some(id) => id,
                                None => break,
                            },
                        }
                    };
                    if let Err(e) = pipeline.run(id).await {
                        tracing::error!(worker_id, image_id = %id, error = %e, "pipeline run failed");
                    }
                }
                tracing::debug!(worker_id, "pipeline worker stopped");
            }));
        }

        tracing::info!(worker_count, "pipeline scheduler started");
        Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            cancel,
        })
    }

    /// Enqueue a pipeline run for the given image id.
    pub fn schedule(&self, id: Uuid) -> Result<(), SchedulerClosed> {
        let sender = self.sender.lock().expect("scheduler lock poisoned");
        match sender.as_ref() {
            Some(tx) => tx.send(id).map_err(|_| SchedulerClosed),
            None => Err(SchedulerClosed),
        }
    }

    /// Drain queued and in-flight runs up to `drain_timeout`, then cancel
    /// the rest. Idempotent.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        // Closing the channel lets workers finish the queue and exit.
        drop(self.sender.lock().expect("scheduler lock poisoned").take());

        let workers = std::mem::take(&mut *self.workers.lock().expect("scheduler lock poisoned"));
        let deadline = Instant::now() + drain_timeout;
        let mut drained = true;
        for mut handle in workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut handle).await.is_err() {
                drained = false;
                self.cancel.cancel();
                // Give the worker one tick to observe the cancellation.
                if tokio::time::timeout(Duration::from_secs(1), &mut handle)
                    .await
                    .is_err()
                {
                    handle.abort();
                }
            }
        }

        if drained {
            tracing::info!("pipeline scheduler drained");
        } else {
            tracing::warn!("pipeline scheduler shutdown timed out, in-flight runs cancelled");
        }
    }
}
