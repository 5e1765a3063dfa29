//! The task envelope and the pluggable-computation seam.
//!
//! What a task actually *computes* is deliberately out of this crate's
//! scope — the fabric only needs to know a task's routing identity, whether
//! it decomposes (`coarse`) or produces a plain value, and how to hand its
//! opaque body to whatever registered [`TaskBody`] knows how to run it.
//! This mirrors how `dsl_v2`'s verb registry keeps the interpreter ignorant
//! of any individual verb's implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FabricError;
use crate::result::SuccessorTask;
use crate::task_id::TaskId;

/// A task as it travels the wire and sits in ready queues / running-task
/// maps. `args` is empty for freshly decomposed tasks and populated only
/// when a [`SuccessorTask`] is released and turned back into a `Task` for
/// execution.
///
/// `target_task_id`/`target_slot` say where a *value* this task produces
/// should be routed — the slot of a successor. They are meaningless when
/// this task turns out to decompose further (`coarse` completion reports
/// through its own freshly-minted successor instead); a `TaskBody`
/// implementation sets them on every child it hands back in
/// [`ExecOutput::Coarse`]. The original client-submitted task is
/// self-targeting (`target_task_id == id`), which is never a live key in
/// any successor map and so is simply inert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub layer: u32,
    pub coarse: bool,
    pub kind: String,
    pub body: Vec<u8>,
    pub args: Vec<Value>,
    pub target_task_id: TaskId,
    pub target_slot: usize,
    /// Set only for a released `SuccessorTask`: which Computer Proxy's
    /// intermediate queue should receive this task's result if the Space
    /// discharges it directly instead of shipping it to a Computer.
    pub origin_computer_id: Option<u32>,
}

impl Task {
    pub fn new_leaf(id: TaskId, layer: u32, kind: impl Into<String>, body: Vec<u8>) -> Self {
        let target_task_id = id.clone();
        Self {
            id,
            layer,
            coarse: false,
            kind: kind.into(),
            body,
            args: Vec::new(),
            target_task_id,
            target_slot: 0,
            origin_computer_id: None,
        }
    }

    pub fn new_coarse(id: TaskId, layer: u32, kind: impl Into<String>, body: Vec<u8>) -> Self {
        let target_task_id = id.clone();
        Self {
            id,
            layer,
            coarse: true,
            kind: kind.into(),
            body,
            args: Vec::new(),
            target_task_id,
            target_slot: 0,
            origin_computer_id: None,
        }
    }

    #[must_use]
    pub fn routed_to(mut self, target_task_id: TaskId, target_slot: usize) -> Self {
        self.target_task_id = target_task_id;
        self.target_slot = target_slot;
        self
    }

    /// True for a task turned from a released `SuccessorTask` — the
    /// `!:`-marked continuation a Space may discharge itself rather than
    /// ship to a Computer.
    pub fn is_successor(&self) -> bool {
        self.id.successor
    }

    /// Turn a fully-collected successor back into a runnable task. The
    /// successor's own id already carries the `!:` marker.
    pub fn from_released_successor(successor: &SuccessorTask) -> Self {
        Self {
            id: successor.id.clone(),
            layer: successor.layer,
            coarse: false,
            kind: successor.kind.clone(),
            body: successor.body.clone(),
            args: successor
                .args
                .iter()
                .cloned()
                .map(|slot| slot.unwrap_or(Value::Null))
                .collect(),
            target_task_id: successor.target_task_id.clone(),
            target_slot: successor.target_slot,
            origin_computer_id: successor.origin_computer_id,
        }
    }

    /// Look up this task's kind in `registry`, run it, and turn the
    /// outcome into the `Result` variant the caller forwards upward.
    ///
    /// A `TaskBody` builds its children and successor with placeholder
    /// routing fields — it has no access to a universe-wide id counter and
    /// no need to know where its own value is ultimately headed. This
    /// method fills in the real routing: the successor's id is always this
    /// task's own id with the `!:` marker set, every child targets that
    /// successor at its position in the decomposition, and the successor
    /// itself forwards to wherever this task's own value was headed. For
    /// the original client-submitted task, `self.target_task_id == self.id`
    /// (see `new_coarse`), so the successor ends up self-targeting too —
    /// the final-answer sentinel described in `SuccessorTask`'s docs.
    pub fn execute(&self, registry: &dyn TaskRegistry) -> Result<crate::result::TaskResult, FabricError> {
        let body = registry.construct(&self.kind, &self.body, &self.args)?;
        Ok(match body.execute() {
            ExecOutput::Value(value) => crate::result::TaskResult::Value(crate::result::ValueResult {
                origin_task_id: self.id.clone(),
                target_task_id: self.target_task_id.clone(),
                slot_index: self.target_slot,
                value,
            }),
            ExecOutput::Coarse {
                mut children,
                mut successor,
            } => {
                let successor_id = self.id.as_successor();
                successor.id = successor_id.clone();
                successor.target_task_id = self.target_task_id.clone();
                successor.target_slot = self.target_slot;
                for (slot, child) in children.iter_mut().enumerate() {
                    child.target_task_id = successor_id.clone();
                    child.target_slot = slot;
                }
                crate::result::TaskResult::Coarse(crate::result::CoarseResult {
                    origin_task_id: self.id.clone(),
                    child_tasks: children,
                    successor,
                })
            }
        })
    }
}

/// The concrete computation a task kind performs. Implementors plug into
/// the fabric through a [`TaskRegistry`]; the scheduler never downcasts or
/// otherwise inspects this beyond calling `execute`.
pub trait TaskBody: Send + Sync {
    fn execute(&self) -> ExecOutput;
}

/// Reconstructs a [`TaskBody`] from its wire-level `(kind, body, args)`
/// triple. One registry is shared by a Computer's worker pool and by a
/// Space's `spaceExecuteTask` fast path, so both discharge the same set of
/// task kinds identically.
pub trait TaskRegistry: Send + Sync {
    fn construct(&self, kind: &str, body: &[u8], args: &[Value]) -> Result<Box<dyn TaskBody>, FabricError>;
}

/// The result of running a [`TaskBody`].
pub enum ExecOutput {
    /// A plain value — no further decomposition.
    Value(Value),
    /// A coarse decomposition: child tasks to schedule plus the successor
    /// that will collect their results.
    Coarse {
        children: Vec<Task>,
        successor: SuccessorTask,
    },
}
