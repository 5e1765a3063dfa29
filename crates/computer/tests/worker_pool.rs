//! The worker pool executes submitted tasks on its own threads and reports
//! results back over the unbounded channel, independent of any gRPC plumbing.

use std::sync::Arc;
use std::time::Duration;

use computer::WorkerPool;
use fabric_demo::registry;
use fabric_types::{Task, TaskId, TaskResult};
use tokio::sync::mpsc;

#[tokio::test]
async fn submitted_leaf_task_produces_a_value_result() {
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::spawn(2, Arc::new(registry()), result_tx);

    let task = Task::new_leaf(TaskId::assign_universe(1, 0, 1), 0, "fib", serde_json::to_vec(&1u64).unwrap());
    pool.submit(task).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), result_rx.recv())
        .await
        .expect("worker should answer promptly")
        .expect("channel stays open");
    match result {
        TaskResult::Value(v) => assert_eq!(v.value, serde_json::Value::from(1)),
        other => panic!("expected a value result for a leaf fib task, got {other:?}"),
    }
}

#[tokio::test]
async fn submitted_coarse_task_produces_children_and_a_successor() {
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::spawn(1, Arc::new(registry()), result_tx);

    let task = Task::new_coarse(TaskId::assign_universe(2, 0, 1), 0, "fib", serde_json::to_vec(&4u64).unwrap());
    pool.submit(task).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), result_rx.recv())
        .await
        .expect("worker should answer promptly")
        .expect("channel stays open");
    match result {
        TaskResult::Coarse(c) => {
            assert_eq!(c.child_tasks.len(), 2);
            assert_eq!(c.successor.kind, "fib_sum");
        }
        other => panic!("expected a coarse result for fib(4), got {other:?}"),
    }
}

#[test]
fn worker_count_matches_what_was_requested() {
    let (result_tx, _result_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::spawn(3, Arc::new(registry()), result_tx);
    assert_eq!(pool.worker_count(), 3);
}
