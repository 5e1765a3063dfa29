//! Result polymorphism: a task's execution either spawns children
//! ([`CoarseResult`]) or fills a waiting argument slot ([`ValueResult`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::Task;
use crate::task_id::TaskId;

/// A coarse task's continuation: registered in a successor map the moment
/// its parent decomposes, and released back onto a ready queue once every
/// argument slot has been filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessorTask {
    /// The `!:`-prefixed id children address via `target_task_id`.
    pub id: TaskId,
    pub layer: u32,
    pub kind: String,
    pub body: Vec<u8>,
    /// One slot per expected child result; `None` until filled.
    pub args: Vec<Option<Value>>,
    pub pending_count: u32,
    /// The successor (or, for the root decomposition, the original
    /// client task) to notify one level up. Always present: a root
    /// successor targets its own parent task's id, which is never a live
    /// successor-map key, so routing a value there is a no-op that simply
    /// falls through as the final client answer.
    pub target_task_id: TaskId,
    pub target_slot: usize,
    /// Which Computer Proxy's intermediate queue receives this successor's
    /// eventual result once it is released and discharged by
    /// `spaceExecuteTask`, set when the parent `CoarseResult` was processed.
    pub origin_computer_id: Option<u32>,
}

impl SuccessorTask {
    pub fn new(
        id: TaskId,
        layer: u32,
        kind: impl Into<String>,
        body: Vec<u8>,
        slot_count: usize,
        target_task_id: TaskId,
        target_slot: usize,
        origin_computer_id: Option<u32>,
    ) -> Self {
        Self {
            id,
            layer,
            kind: kind.into(),
            body,
            args: vec![None; slot_count],
            pending_count: slot_count as u32,
            target_task_id,
            target_slot,
            origin_computer_id,
        }
    }

    /// A root successor: its target is its own parent task's id (inert —
    /// see the field docs), so the original client task id doubles as the
    /// harmless "nothing real to notify" sentinel.
    pub fn new_root(
        id: TaskId,
        layer: u32,
        kind: impl Into<String>,
        body: Vec<u8>,
        slot_count: usize,
        origin_task_id: TaskId,
    ) -> Self {
        Self::new(id, layer, kind, body, slot_count, origin_task_id, 0, None)
    }

    /// Built by a `TaskBody` during decomposition, before the fabric knows
    /// its real routing. `Task::execute` unconditionally overwrites `id`,
    /// `target_task_id`, and `target_slot` once this successor's parent
    /// task's own identity is known, so the values supplied here are
    /// placeholders.
    pub fn draft(layer: u32, kind: impl Into<String>, body: Vec<u8>, slot_count: usize) -> Self {
        let placeholder = TaskId::assign_universe(0, 0, 0);
        Self::new(placeholder.clone(), layer, kind, body, slot_count, placeholder, 0, None)
    }

    /// Fill `slot` with `value`. Returns `true` once every slot has been
    /// filled, i.e. this successor is now ready to run.
    ///
    /// Idempotent under duplicate delivery: re-filling an already-filled
    /// slot does not double-decrement `pending_count`, so the counter never
    /// goes negative even if a child's result is redelivered after a
    /// re-dispatch.
    pub fn fill_slot(&mut self, slot: usize, value: Value) -> bool {
        if let Some(existing) = self.args.get_mut(slot) {
            if existing.is_none() {
                *existing = Some(value);
                self.pending_count = self.pending_count.saturating_sub(1);
            }
        }
        self.pending_count == 0
    }

    pub fn into_task(self) -> Task {
        Task::from_released_successor(&self)
    }
}

/// A coarse task's decomposition: children to schedule plus the successor
/// they report back into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoarseResult {
    /// The task that decomposed.
    pub origin_task_id: TaskId,
    pub child_tasks: Vec<Task>,
    pub successor: SuccessorTask,
}

/// A leaf task's plain value, destined for a slot in a waiting successor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResult {
    /// The task that produced this value.
    pub origin_task_id: TaskId,
    /// The successor whose slot this value fills.
    pub target_task_id: TaskId,
    pub slot_index: usize,
    pub value: Value,
}

/// The two result shapes a Computer, Space, or Universe ever routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskResult {
    Coarse(CoarseResult),
    Value(ValueResult),
}

impl TaskResult {
    pub fn origin_task_id(&self) -> &TaskId {
        match self {
            TaskResult::Coarse(c) => &c.origin_task_id,
            TaskResult::Value(v) => &v.origin_task_id,
        }
    }
}
