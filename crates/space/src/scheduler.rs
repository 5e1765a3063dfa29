use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fabric_core::{PeerRegistry, SchedulerState};
use fabric_types::{Task, TaskRegistry, TaskResult};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::proxy::ComputerProxy;

/// State identical in shape to the Universe Scheduler, plus a result
/// queue and the Computer Proxy table (§4.4).
pub struct SpaceScheduler {
    pub space_id: u32,
    pub state: SchedulerState,
    pub computers: PeerRegistry<ComputerProxy>,
    /// Drained by this Space's own `GetResult` RPC handler — the Universe's
    /// Space Proxy is the sole consumer.
    result_tx: mpsc::UnboundedSender<TaskResult>,
    result_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<TaskResult>>>,
    pub registry: Arc<dyn TaskRegistry>,
    next_space_seq: AtomicU64,
}

impl SpaceScheduler {
    pub fn new(space_id: u32, registry: Arc<dyn TaskRegistry>) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            space_id,
            state: SchedulerState::new(),
            computers: PeerRegistry::new(),
            result_tx,
            result_rx: tokio::sync::Mutex::new(Some(result_rx)),
            registry,
            next_space_seq: AtomicU64::new(0),
        }
    }

    pub fn next_space_seq(&self) -> u64 {
        self.next_space_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Enqueue a result for upward delivery to the Universe. This is the
    /// Computer Proxy's only way to escalate — see §4.7.
    pub fn add_result(&self, result: TaskResult) {
        let _ = self.result_tx.send(result);
    }

    /// Taken exactly once, by the first `GetResult` call.
    pub async fn take_result_rx(&self) -> Option<mpsc::UnboundedReceiver<TaskResult>> {
        self.result_rx.lock().await.take()
    }

    /// Trivial continuations the Space discharges itself rather than ship
    /// to a Computer: run the released successor inline and hand its
    /// result to whichever Computer Proxy's intermediate queue its
    /// lineage names, so it rejoins the normal upward-forwarding path.
    pub async fn space_execute_task(&self, task: Task) {
        debug!(task_id = %task.id, "space discharging trivial continuation locally");
        let result = match task.execute(self.registry.as_ref()) {
            Ok(r) => r,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "local execution of successor failed");
                return;
            }
        };
        let origin_computer = match task.origin_computer_id {
            Some(id) => self.computers.get(id).await,
            None => None,
        };
        match origin_computer {
            Some(computer) => {
                let _ = computer.intermediate_tx.send(result);
            }
            None => self.add_result(result),
        }
    }
}
