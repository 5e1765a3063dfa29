//! The Computer's local thread pool (§10 ambient stack): a bounded
//! `crossbeam-channel` work queue feeding a fixed set of `std::thread`
//! workers. This is the "local threads" collaborator named in §1 of the
//! scheduling design, given a concrete shape since the Computer tier is
//! otherwise out of that design's scope.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use fabric_types::{Task, TaskRegistry, TaskResult};
use tokio::sync::mpsc;
use tracing::warn;

const QUEUE_CAPACITY: usize = 256;

pub struct WorkerPool {
    job_tx: crossbeam_channel::Sender<Task>,
    worker_count: usize,
    busy: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `workers` OS threads, each pulling from a shared bounded
    /// queue and pushing its result onto `result_tx`.
    pub fn spawn(
        workers: usize,
        registry: Arc<dyn TaskRegistry>,
        result_tx: mpsc::UnboundedSender<TaskResult>,
    ) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Task>(QUEUE_CAPACITY);
        let busy = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..workers {
            let job_rx = job_rx.clone();
            let registry = registry.clone();
            let result_tx = result_tx.clone();
            let busy = busy.clone();
            thread::Builder::new()
                .name(format!("computer-worker-{worker_id}"))
                .spawn(move || {
                    while let Ok(mut task) = job_rx.recv() {
                        busy.fetch_add(1, Ordering::SeqCst);
                        task.id = task.id.with_worker(worker_id as u32);
                        match task.execute(registry.as_ref()) {
                            Ok(result) => {
                                let _ = result_tx.send(result);
                            }
                            Err(e) => {
                                warn!(worker_id, task_id = %task.id, error = %e, "task execution failed");
                            }
                        }
                        busy.fetch_sub(1, Ordering::SeqCst);
                    }
                })
                .expect("failed to spawn computer worker thread");
        }

        Self {
            job_tx,
            worker_count: workers,
            busy,
        }
    }

    /// Enqueue a task. Blocks the calling async task briefly if the queue
    /// is momentarily full; callers run this inside `spawn_blocking` at
    /// the RPC boundary to avoid stalling the executor.
    pub fn submit(&self, task: Task) -> Result<(), crossbeam_channel::SendError<Task>> {
        self.job_tx.send(task)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) >= self.worker_count
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}
