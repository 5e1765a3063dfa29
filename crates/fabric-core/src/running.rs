//! Per-proxy running-task tracking, used to re-dispatch work when the peer
//! on the other end of a proxy dies.

use std::collections::HashMap;

use tokio::sync::Mutex;

use fabric_types::{Task, TaskId};

#[derive(Default)]
pub struct RunningTaskMap {
    inner: Mutex<HashMap<TaskId, Task>>,
}

impl RunningTaskMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: Task) {
        self.inner.lock().await.insert(task.id.clone(), task);
    }

    pub async fn remove(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drain every task, for re-dispatch onto the parent tier's ready
    /// queue after this proxy's peer has died.
    pub async fn drain_all(&self) -> Vec<Task> {
        self.inner.lock().await.drain().map(|(_, t)| t).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_all_empties_the_map() {
        let map = RunningTaskMap::new();
        let id = TaskId::assign_universe(1, 0, 1);
        map.insert(Task::new_leaf(id.clone(), 0, "k", vec![])).await;
        assert_eq!(map.len().await, 1);
        let drained = map.drain_all().await;
        assert_eq!(drained.len(), 1);
        assert!(map.is_empty().await);
    }
}
