//! The one concrete computation this fabric ships with: naive recursive
//! Fibonacci, decomposed into a fan-out/fan-in pair per §1's "external
//! collaborator" carve-out. Exercises the full coarse/successor machinery
//! (scenarios E1-E6) without pretending to be a useful algorithm.

use fabric_types::{ExecOutput, FabricError, SuccessorTask, Task, TaskBody, TaskId, TaskRegistry};
use serde_json::Value;

const FIB_KIND: &str = "fib";
const FIB_SUM_KIND: &str = "fib_sum";

fn encode_n(n: u64) -> Vec<u8> {
    serde_json::to_vec(&n).expect("u64 always serializes to json")
}

/// Build a task for `fib(n)`, leaf or coarse depending on whether `n`
/// terminates the recursion. Its `id`/`target_task_id` are placeholders —
/// `Task::execute` fills in the real ones once this is returned as a child
/// of a decomposing parent.
fn fib_task(n: u64) -> Task {
    let placeholder = TaskId::assign_universe(0, 0, 0);
    if n < 2 {
        Task::new_leaf(placeholder, 0, FIB_KIND, encode_n(n))
    } else {
        Task::new_coarse(placeholder, 0, FIB_KIND, encode_n(n))
    }
}

struct FibTask {
    n: u64,
}

impl TaskBody for FibTask {
    fn execute(&self) -> ExecOutput {
        if self.n < 2 {
            return ExecOutput::Value(Value::from(self.n));
        }
        let successor = SuccessorTask::draft(0, FIB_SUM_KIND, Vec::new(), 2);
        ExecOutput::Coarse {
            children: vec![fib_task(self.n - 1), fib_task(self.n - 2)],
            successor,
        }
    }
}

struct FibSumTask {
    a: u64,
    b: u64,
}

impl TaskBody for FibSumTask {
    fn execute(&self) -> ExecOutput {
        ExecOutput::Value(Value::from(self.a + self.b))
    }
}

fn as_u64(value: &Value, slot: usize) -> Result<u64, FabricError> {
    value
        .as_u64()
        .ok_or_else(|| FabricError::Codec(format!("fib_sum slot {slot} is not a u64")))
}

#[derive(Clone, Copy, Default)]
pub struct DemoRegistry;

impl TaskRegistry for DemoRegistry {
    fn construct(&self, kind: &str, body: &[u8], args: &[Value]) -> Result<Box<dyn TaskBody>, FabricError> {
        match kind {
            FIB_KIND => {
                let n: u64 =
                    serde_json::from_slice(body).map_err(|e| FabricError::Codec(e.to_string()))?;
                Ok(Box::new(FibTask { n }))
            }
            FIB_SUM_KIND => {
                let a = args.first().ok_or_else(|| FabricError::Codec("fib_sum missing slot 0".into()))?;
                let b = args.get(1).ok_or_else(|| FabricError::Codec("fib_sum missing slot 1".into()))?;
                Ok(Box::new(FibSumTask {
                    a: as_u64(a, 0)?,
                    b: as_u64(b, 1)?,
                }))
            }
            other => Err(FabricError::UnknownTaskKind(other.to_string())),
        }
    }
}

pub fn registry() -> DemoRegistry {
    DemoRegistry
}
