//! Computer Proxy (§4.7), living inside the Space. Mirrors the Space Proxy
//! one tier down: a send task dispatching ready work to a Computer, and a
//! receive task draining both the Computer's `GetResult` stream and a
//! local intermediate-result queue fed by `spaceExecuteTask`.

use std::sync::Arc;
use std::time::Duration;

use fabric_core::RunningTaskMap;
use fabric_proto::proto;
use fabric_proto::proto::computer_rpc_client::ComputerRpcClient;
use fabric_types::TaskResult;
use tokio::sync::mpsc;
use tonic::Request;
use tracing::{debug, info, warn};

use crate::scheduler::SpaceScheduler;

const COMPUTER_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct ComputerProxy {
    pub addr: String,
    pub running: RunningTaskMap,
    /// Fed by `SpaceScheduler::space_execute_task` for trivial
    /// continuations whose lineage names this proxy.
    pub intermediate_tx: mpsc::UnboundedSender<TaskResult>,
}

pub fn spawn_computer_proxy(
    space: Arc<SpaceScheduler>,
    computer_id: u32,
    addr: String,
    intermediate_rx: mpsc::UnboundedReceiver<TaskResult>,
) {
    tokio::spawn(computer_send_task(space.clone(), computer_id, addr.clone()));
    tokio::spawn(computer_receive_task(
        space,
        computer_id,
        addr,
        intermediate_rx,
    ));
}

async fn computer_send_task(space: Arc<SpaceScheduler>, computer_id: u32, addr: String) {
    let mut client = match ComputerRpcClient::connect(addr).await {
        Ok(c) => c,
        Err(e) => {
            warn!(computer_id, error = %e, "failed to dial computer for AddTask");
            fail_computer(&space, computer_id).await;
            return;
        }
    };

    loop {
        match client.is_busy(Request::new(proto::Empty {})).await {
            Ok(resp) => {
                if resp.into_inner().busy {
                    tokio::time::sleep(COMPUTER_POLL_INTERVAL).await;
                    continue;
                }
            }
            Err(e) => {
                warn!(computer_id, error = %e, "IsBusy call failed");
                fail_computer(&space, computer_id).await;
                return;
            }
        }

        let Some(mut task) = space.state.try_pop_ready().await else {
            tokio::time::sleep(COMPUTER_POLL_INTERVAL).await;
            continue;
        };

        // A released successor is a trivial continuation: discharge it
        // locally instead of paying for a Computer round trip.
        if task.is_successor() {
            space.space_execute_task(task).await;
            continue;
        }

        task.id = task.id.with_computer(computer_id);
        let msg = match fabric_core::codec::task_to_proto(&task) {
            Ok(m) => m,
            Err(e) => {
                warn!(computer_id, error = %e, "failed to encode task for computer");
                continue;
            }
        };
        match client.add_task(Request::new(msg)).await {
            Ok(_) => {
                if let Some(computer) = space.computers.get(computer_id).await {
                    computer.running.insert(task).await;
                } else {
                    return;
                }
            }
            Err(e) => {
                warn!(computer_id, error = %e, "AddTask failed");
                space.state.push_ready(task).await;
                fail_computer(&space, computer_id).await;
                return;
            }
        }
    }
}

async fn computer_receive_task(
    space: Arc<SpaceScheduler>,
    computer_id: u32,
    addr: String,
    mut intermediate_rx: mpsc::UnboundedReceiver<TaskResult>,
) {
    let mut client = match ComputerRpcClient::connect(addr).await {
        Ok(c) => c,
        Err(e) => {
            warn!(computer_id, error = %e, "failed to dial computer for GetResult");
            fail_computer(&space, computer_id).await;
            return;
        }
    };

    let mut stream = match client.get_result(Request::new(proto::Empty {})).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(computer_id, error = %e, "GetResult call failed");
            fail_computer(&space, computer_id).await;
            return;
        }
    };

    loop {
        tokio::select! {
            biased;

            msg = intermediate_rx.recv() => {
                match msg {
                    Some(result) => forward_result(&space, computer_id, result).await,
                    None => {}
                }
            }

            item = stream.message() => {
                match item {
                    Ok(Some(msg)) => {
                        let result = match fabric_core::codec::result_from_proto(msg) {
                            Ok(r) => r,
                            Err(e) => {
                                warn!(computer_id, error = %e, "failed to decode result from computer");
                                continue;
                            }
                        };
                        if let Some(computer) = space.computers.get(computer_id).await {
                            computer.running.remove(result.origin_task_id()).await;
                        }
                        forward_result(&space, computer_id, result).await;
                    }
                    Ok(None) => {
                        info!(computer_id, "computer closed GetResult stream");
                        break;
                    }
                    Err(e) => {
                        warn!(computer_id, error = %e, "GetResult stream error");
                        break;
                    }
                }
            }
        }
    }
    fail_computer(&space, computer_id).await;
}

/// §4.7: a value result is tried against this Space's own successor map
/// first; only on a miss does it, stripped of its `:C…` suffix, escalate
/// to the Universe via `space.addResult`. A coarse result always escalates
/// the same way — its own id stripped of `:C…` too, so the Universe Space
/// Proxy's running-task map (keyed by the un-suffixed `:P`-tagged id) can
/// find and remove it — stamped with this proxy's id so a later
/// trivial-successor release can find its way back to the same
/// intermediate queue.
async fn forward_result(space: &Arc<SpaceScheduler>, computer_id: u32, result: TaskResult) {
    match result {
        TaskResult::Coarse(mut coarse) => {
            coarse.origin_task_id = coarse.origin_task_id.strip_computer();
            coarse.successor.origin_computer_id = Some(computer_id);
            debug!(computer_id, successor_id = %coarse.successor.id, "coarse result escalated to universe");
            space.add_result(TaskResult::Coarse(coarse));
        }
        TaskResult::Value(mut value) => {
            value.origin_task_id = value.origin_task_id.strip_computer();
            match space.state.process_result(TaskResult::Value(value)).await {
                fabric_core::ProcessOutcome::Absorbed => {}
                fabric_core::ProcessOutcome::Propagate(result) => {
                    debug!(computer_id, "value result escalated to universe");
                    space.add_result(result);
                }
            }
        }
    }
}

async fn fail_computer(space: &Arc<SpaceScheduler>, computer_id: u32) {
    if let Some(computer) = space.computers.unregister(computer_id).await {
        let running = computer.running.drain_all().await;
        warn!(
            computer_id,
            re_dispatched = running.len(),
            "computer proxy failed, re-enqueuing running tasks"
        );
        for task in running {
            space.state.push_ready(task).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::TaskId;

    /// E2 one tier down: a Computer dies mid-flight with tasks still
    /// outstanding in its running-task map; the Space must re-enqueue all
    /// of them.
    #[tokio::test]
    async fn failing_a_computer_re_enqueues_its_running_tasks() {
        let space = Arc::new(SpaceScheduler::new(0, Arc::new(fabric_demo::registry())));
        let (intermediate_tx, _intermediate_rx) = mpsc::unbounded_channel();
        let computer_id = space
            .computers
            .register(ComputerProxy {
                addr: "http://127.0.0.1:0".into(),
                running: RunningTaskMap::new(),
                intermediate_tx,
            })
            .await;
        let computer = space.computers.get(computer_id).await.unwrap();
        computer
            .running
            .insert(fabric_types::Task::new_leaf(
                TaskId::assign_universe(1, 0, 1),
                0,
                "leaf",
                vec![],
            ))
            .await;

        fail_computer(&space, computer_id).await;

        assert_eq!(space.state.ready_len().await, 1);
        assert!(space.computers.get(computer_id).await.is_none());
    }

    /// A coarse result's `origin_task_id` must lose its `:C…` suffix before
    /// escalating, the same as a value result's, so the Universe Space
    /// Proxy's running-task map (keyed by the un-suffixed id) can find and
    /// remove the entry it inserted.
    #[tokio::test]
    async fn coarse_result_strips_computer_suffix_before_escalating() {
        let space = Arc::new(SpaceScheduler::new(0, Arc::new(fabric_demo::registry())));
        let mut result_rx = space.take_result_rx().await.unwrap();

        let tagged_id = TaskId::assign_universe(4, 0, 4).with_computer(7);
        let successor = fabric_types::SuccessorTask::new_root(
            tagged_id.as_successor(),
            0,
            "fib_sum",
            vec![],
            2,
            tagged_id.clone(),
        );
        forward_result(
            &space,
            7,
            TaskResult::Coarse(fabric_types::CoarseResult {
                origin_task_id: tagged_id,
                child_tasks: vec![],
                successor,
            }),
        )
        .await;

        let escalated = result_rx.recv().await.expect("coarse result escalates");
        match escalated {
            TaskResult::Coarse(c) => assert!(
                c.origin_task_id.computer_id.is_none(),
                "computer suffix must be stripped before the result leaves the space"
            ),
            other => panic!("expected a coarse result, got {other:?}"),
        }
    }
}
