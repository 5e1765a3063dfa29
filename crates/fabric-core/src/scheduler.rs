//! The ready queue + successor map pair shared, in identical shape, by the
//! Universe Scheduler and the Space Scheduler.
//!
//! Locking discipline (outermost first, matching the documented order):
//! `ready_queue` before `successor_map`. `process_result` takes both locks
//! in that order even on the value-result path, where only `successor_map`
//! strictly needs it, so that a concurrent coarse-result release can never
//! observe the reverse order.

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;
use tracing::debug;

use fabric_types::{CoarseResult, Task, TaskId, TaskResult, ValueResult};

/// What became of a processed result.
pub enum ProcessOutcome {
    /// Absorbed by this tier; nothing further to do.
    Absorbed,
    /// Not ours to resolve — forward to the parent tier.
    Propagate(TaskResult),
}

#[derive(Default)]
pub struct SchedulerState {
    ready_queue: Mutex<VecDeque<Task>>,
    successor_map: Mutex<HashMap<TaskId, fabric_types::SuccessorTask>>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_ready(&self, task: Task) {
        let mut q = self.ready_queue.lock().await;
        debug!(task_id = %task.id, depth = q.len() + 1, "ready task enqueued");
        q.push_back(task);
    }

    /// Non-blocking pop, used by the ~5ms idle-poll dispatch loops.
    pub async fn try_pop_ready(&self) -> Option<Task> {
        self.ready_queue.lock().await.pop_front()
    }

    pub async fn ready_len(&self) -> usize {
        self.ready_queue.lock().await.len()
    }

    /// Drop every ready task owned by a dead Server, per the fault table:
    /// a dead client's queued work is discarded rather than re-dispatched.
    pub async fn purge_ready_by_server(&self, server_id: u32) -> usize {
        let mut q = self.ready_queue.lock().await;
        let before = q.len();
        q.retain(|t| t.id.owning_server_id() != server_id);
        before - q.len()
    }

    pub async fn register_successor_unlocked(&self, successor: fabric_types::SuccessorTask) {
        self.successor_map
            .lock()
            .await
            .insert(successor.id.clone(), successor);
    }

    pub async fn successor_count(&self) -> usize {
        self.successor_map.lock().await.len()
    }

    /// A point-in-time copy of both maps, for checkpointing.
    pub async fn snapshot(&self) -> (Vec<Task>, Vec<fabric_types::SuccessorTask>) {
        let ready = self.ready_queue.lock().await.iter().cloned().collect();
        let successors = self.successor_map.lock().await.values().cloned().collect();
        (ready, successors)
    }

    /// Replace both maps wholesale, used when restoring from a recovery
    /// file. Not merged with any existing state — callers restore into a
    /// freshly constructed `SchedulerState`.
    pub async fn restore(&self, ready: Vec<Task>, successors: Vec<fabric_types::SuccessorTask>) {
        *self.ready_queue.lock().await = ready.into_iter().collect();
        *self.successor_map.lock().await = successors
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
    }

    /// Apply §4.2's `process()` semantics. Always locks `ready_queue` then
    /// `successor_map`, even on the pure value-result path, to hold the
    /// documented lock order under concurrent coarse-result releases.
    pub async fn process_result(&self, result: TaskResult) -> ProcessOutcome {
        let mut ready = self.ready_queue.lock().await;
        let mut successors = self.successor_map.lock().await;

        match result {
            TaskResult::Coarse(CoarseResult {
                origin_task_id: _,
                child_tasks,
                successor,
            }) => {
                for child in child_tasks {
                    debug!(task_id = %child.id, "coarse decomposition scheduled child");
                    ready.push_back(child);
                }
                debug!(successor_id = %successor.id, "successor registered");
                successors.insert(successor.id.clone(), successor);
                ProcessOutcome::Absorbed
            }
            TaskResult::Value(value_result) => {
                let ValueResult {
                    ref target_task_id, ..
                } = value_result;
                let Some(successor) = successors.get_mut(target_task_id) else {
                    drop(successors);
                    drop(ready);
                    return ProcessOutcome::Propagate(TaskResult::Value(value_result));
                };
                let ready_now = successor.fill_slot(value_result.slot_index, value_result.value);
                if ready_now {
                    let successor = successors.remove(target_task_id).expect("just matched");
                    debug!(successor_id = %successor.id, "successor released to ready queue");
                    ready.push_back(successor.into_task());
                }
                ProcessOutcome::Absorbed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::{SuccessorTask, TaskResult, ValueResult};

    fn id(n: u64) -> TaskId {
        TaskId::assign_universe(n, 0, n)
    }

    #[tokio::test]
    async fn coarse_result_enqueues_children_and_registers_successor() {
        let state = SchedulerState::new();
        let successor = SuccessorTask::new_root(id(1).as_successor(), 0, "sum", vec![], 1, id(1));
        let child = Task::new_leaf(id(2), 1, "leaf", vec![]);
        let outcome = state
            .process_result(TaskResult::Coarse(CoarseResult {
                origin_task_id: id(1),
                child_tasks: vec![child],
                successor,
            }))
            .await;
        assert!(matches!(outcome, ProcessOutcome::Absorbed));
        assert_eq!(state.ready_len().await, 1);
        assert_eq!(state.successor_count().await, 1);
    }

    #[tokio::test]
    async fn value_result_for_unknown_target_propagates() {
        let state = SchedulerState::new();
        let outcome = state
            .process_result(TaskResult::Value(ValueResult {
                origin_task_id: id(2),
                target_task_id: id(1).as_successor(),
                slot_index: 0,
                value: serde_json::Value::from(1),
            }))
            .await;
        assert!(matches!(outcome, ProcessOutcome::Propagate(_)));
    }

    #[tokio::test]
    async fn value_result_releases_successor_once_all_slots_filled() {
        let state = SchedulerState::new();
        let successor_id = id(1).as_successor();
        let successor =
            SuccessorTask::new_root(successor_id.clone(), 0, "sum", vec![], 2, id(1));
        state.register_successor_unlocked(successor).await;

        let outcome = state
            .process_result(TaskResult::Value(ValueResult {
                origin_task_id: id(2),
                target_task_id: successor_id.clone(),
                slot_index: 0,
                value: serde_json::Value::from(1),
            }))
            .await;
        assert!(matches!(outcome, ProcessOutcome::Absorbed));
        assert_eq!(state.ready_len().await, 0, "not released yet");

        let outcome = state
            .process_result(TaskResult::Value(ValueResult {
                origin_task_id: id(3),
                target_task_id: successor_id,
                slot_index: 1,
                value: serde_json::Value::from(2),
            }))
            .await;
        assert!(matches!(outcome, ProcessOutcome::Absorbed));
        assert_eq!(state.ready_len().await, 1, "released once complete");
        assert_eq!(state.successor_count().await, 0);
    }
}
