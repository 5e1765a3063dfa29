//! Server Proxy (§4.5) and Space Proxy (§4.6), both living inside the
//! Universe. Each peer maps to a send tokio task and a receive tokio task
//! sharing this small state record, per §5's concurrency model.

use std::sync::Arc;
use std::time::Duration;

use fabric_core::{ProcessOutcome, RunningTaskMap};
use fabric_proto::proto;
use fabric_proto::proto::server_rpc_client::ServerRpcClient;
use fabric_proto::proto::space_rpc_client::SpaceRpcClient;
use fabric_types::{Task, TaskId, TaskResult};
use tokio::sync::mpsc;
use tonic::Request;
use tracing::{debug, info, warn};

use crate::scheduler::UniverseScheduler;

const SPACE_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct ServerProxy {
    pub addr: String,
    pub result_tx: mpsc::UnboundedSender<TaskResult>,
}

pub struct SpaceProxy {
    pub addr: String,
    pub running: RunningTaskMap,
}

/// Spawn the send and receive tasks for a newly registered Server.
pub fn spawn_server_proxy(
    universe: Arc<UniverseScheduler>,
    server_id: u32,
    addr: String,
    result_rx: mpsc::UnboundedReceiver<TaskResult>,
) {
    tokio::spawn(server_send_task(universe.clone(), server_id, addr.clone()));
    tokio::spawn(server_receive_task(universe, server_id, addr, result_rx));
}

async fn server_send_task(universe: Arc<UniverseScheduler>, server_id: u32, addr: String) {
    let mut client = match ServerRpcClient::connect(addr.clone()).await {
        Ok(c) => c,
        Err(e) => {
            warn!(server_id, %addr, error = %e, "failed to dial server for GetTask");
            fail_server(&universe, server_id).await;
            return;
        }
    };

    let mut stream = match client.get_task(Request::new(proto::Empty {})).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(server_id, error = %e, "GetTask call failed");
            fail_server(&universe, server_id).await;
            return;
        }
    };

    loop {
        match stream.message().await {
            Ok(Some(msg)) => {
                let client_task_id: u64 = match msg.id.parse() {
                    Ok(v) => v,
                    Err(_) => {
                        warn!(server_id, raw_id = %msg.id, "malformed client task id, dropping");
                        continue;
                    }
                };
                let universe_seq = universe.next_universe_seq();
                let id = TaskId::assign_universe(client_task_id, server_id, universe_seq);
                let args = msg
                    .args
                    .iter()
                    .filter_map(|b| serde_json::from_slice(b).ok())
                    .collect();
                let task = Task {
                    target_task_id: id.clone(),
                    id: id.clone(),
                    layer: msg.layer,
                    coarse: msg.coarse,
                    kind: msg.kind,
                    body: msg.body,
                    args,
                    target_slot: 0,
                    origin_computer_id: None,
                };
                debug!(%id, server_id, "accepted client task into universe ready queue");
                universe.state.push_ready(task).await;
            }
            Ok(None) => {
                info!(server_id, "server closed GetTask stream");
                break;
            }
            Err(e) => {
                warn!(server_id, error = %e, "GetTask stream error");
                break;
            }
        }
    }
    fail_server(&universe, server_id).await;
}

async fn server_receive_task(
    universe: Arc<UniverseScheduler>,
    server_id: u32,
    addr: String,
    mut result_rx: mpsc::UnboundedReceiver<TaskResult>,
) {
    let mut client = match ServerRpcClient::connect(addr).await {
        Ok(c) => c,
        Err(e) => {
            warn!(server_id, error = %e, "failed to dial server for DispatchResult");
            fail_server(&universe, server_id).await;
            return;
        }
    };

    while let Some(result) = result_rx.recv().await {
        let msg = match fabric_core::codec::result_to_proto(&result) {
            Ok(m) => m,
            Err(e) => {
                warn!(server_id, error = %e, "failed to encode final result");
                continue;
            }
        };
        if let Err(e) = client.dispatch_result(Request::new(msg)).await {
            warn!(server_id, error = %e, "DispatchResult failed");
            fail_server(&universe, server_id).await;
            return;
        }
    }
}

async fn fail_server(universe: &Arc<UniverseScheduler>, server_id: u32) {
    if universe.servers.unregister(server_id).await.is_some() {
        let purged = universe.state.purge_ready_by_server(server_id).await;
        warn!(server_id, purged, "server proxy failed, purged queued tasks");
    }
}

/// Spawn the send and receive tasks for a newly registered Space.
pub fn spawn_space_proxy(universe: Arc<UniverseScheduler>, space_id: u32, addr: String) {
    tokio::spawn(space_send_task(universe.clone(), space_id, addr.clone()));
    tokio::spawn(space_receive_task(universe, space_id, addr));
}

async fn space_send_task(universe: Arc<UniverseScheduler>, space_id: u32, addr: String) {
    let mut client = match SpaceRpcClient::connect(addr).await {
        Ok(c) => c,
        Err(e) => {
            warn!(space_id, error = %e, "failed to dial space for AddTask");
            fail_space(&universe, space_id).await;
            return;
        }
    };

    let mut space_seq: u64 = 0;
    loop {
        let Some(task) = universe.state.try_pop_ready().await else {
            tokio::time::sleep(SPACE_POLL_INTERVAL).await;
            continue;
        };
        let mut task = task;
        if !task.id.has_space() {
            task.id = task.id.with_space(space_id, space_seq);
            space_seq += 1;
        }
        let msg = match fabric_core::codec::task_to_proto(&task) {
            Ok(m) => m,
            Err(e) => {
                warn!(space_id, error = %e, "failed to encode task for space");
                continue;
            }
        };
        match client.add_task(Request::new(msg)).await {
            Ok(_) => {
                let Some(space) = universe.spaces.get(space_id).await else {
                    return;
                };
                space.running.insert(task).await;
            }
            Err(e) => {
                warn!(space_id, error = %e, "AddTask failed");
                universe.state.push_ready(task).await;
                fail_space(&universe, space_id).await;
                return;
            }
        }
    }
}

async fn space_receive_task(universe: Arc<UniverseScheduler>, space_id: u32, addr: String) {
    let mut client = match SpaceRpcClient::connect(addr).await {
        Ok(c) => c,
        Err(e) => {
            warn!(space_id, error = %e, "failed to dial space for GetResult");
            fail_space(&universe, space_id).await;
            return;
        }
    };

    let mut stream = match client.get_result(Request::new(proto::Empty {})).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(space_id, error = %e, "GetResult call failed");
            fail_space(&universe, space_id).await;
            return;
        }
    };

    loop {
        match stream.message().await {
            Ok(Some(msg)) => {
                let result = match fabric_core::codec::result_from_proto(msg) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(space_id, error = %e, "failed to decode result from space");
                        continue;
                    }
                };
                if let Some(space) = universe.spaces.get(space_id).await {
                    space.running.remove(result.origin_task_id()).await;
                }
                route_result(&universe, result).await;
            }
            Ok(None) => {
                info!(space_id, "space closed GetResult stream");
                break;
            }
            Err(e) => {
                warn!(space_id, error = %e, "GetResult stream error");
                break;
            }
        }
    }
    fail_space(&universe, space_id).await;
}

/// A freshly decomposed `CoarseResult` arrives with placeholder ids (its
/// children and successor were built by a `TaskBody` that never had a
/// universe-wide sequence counter to draw from). The Universe mints real
/// ids for them here, the same way the Server Proxy mints an id for a
/// freshly accepted client task — reusing the decomposed task's own
/// `client_task_id`/`server_id` so a dead client's purge still reaches
/// these descendants, but giving each a fresh `universe_seq` so they never
/// collide with one another in a running-task map.
fn remint_coarse_result(universe: &Arc<UniverseScheduler>, mut coarse: fabric_types::CoarseResult) -> fabric_types::CoarseResult {
    let client_task_id = coarse.origin_task_id.client_task_id;
    let server_id = coarse.origin_task_id.server_id;

    let new_successor_id =
        TaskId::assign_universe(client_task_id, server_id, universe.next_universe_seq()).as_successor();
    let old_successor_id = coarse.successor.id.clone();
    coarse.successor.id = new_successor_id.clone();

    for child in &mut coarse.child_tasks {
        child.id = TaskId::assign_universe(client_task_id, server_id, universe.next_universe_seq());
        if child.target_task_id == old_successor_id {
            child.target_task_id = new_successor_id.clone();
        }
    }
    coarse
}

/// Apply §4.2 `process()` at the Universe tier. Anything that propagates
/// out of the root tier is, by construction, a final client answer: a
/// `SuccessorTask`'s `target_task_id` always names its parent task, and the
/// root successor's parent is the original coarse task, which is never a
/// key in any successor map.
async fn route_result(universe: &Arc<UniverseScheduler>, result: TaskResult) {
    let result = match result {
        TaskResult::Coarse(coarse) => TaskResult::Coarse(remint_coarse_result(universe, coarse)),
        other => other,
    };
    match universe.state.process_result(result).await {
        ProcessOutcome::Absorbed => {}
        ProcessOutcome::Propagate(TaskResult::Value(value)) => {
            let server_id = value.target_task_id.owning_server_id();
            if let Some(server) = universe.servers.get(server_id).await {
                debug!(server_id, task_id = %value.target_task_id, "delivering final result to client");
                let _ = server.result_tx.send(TaskResult::Value(value));
            } else {
                debug!(server_id, "final result for unregistered/dead server dropped");
            }
        }
        ProcessOutcome::Propagate(TaskResult::Coarse(_)) => {
            warn!("unreachable: CoarseResult::process always absorbs");
        }
    }
}

async fn fail_space(universe: &Arc<UniverseScheduler>, space_id: u32) {
    if let Some(space) = universe.spaces.unregister(space_id).await {
        let running = space.running.drain_all().await;
        warn!(space_id, re_dispatched = running.len(), "space proxy failed, re-enqueuing running tasks");
        for task in running {
            universe.state.push_ready(task).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Arc<UniverseScheduler> {
        Arc::new(UniverseScheduler::new("/tmp/fabric-proxy-test.recovery".into()))
    }

    /// E2: a Space dies mid-flight with tasks still outstanding in its
    /// running-task map; the Universe must re-enqueue every one of them
    /// rather than lose it.
    #[tokio::test]
    async fn failing_a_space_re_enqueues_its_running_tasks() {
        let universe = scheduler();
        let space_id = universe.register_space("http://127.0.0.1:0".into()).await;
        let space = universe.spaces.get(space_id).await.unwrap();
        space
            .running
            .insert(Task::new_leaf(TaskId::assign_universe(1, 0, 1), 0, "leaf", vec![]))
            .await;
        space
            .running
            .insert(Task::new_leaf(TaskId::assign_universe(1, 0, 2), 0, "leaf", vec![]))
            .await;

        fail_space(&universe, space_id).await;

        assert_eq!(universe.state.ready_len().await, 2);
        assert!(universe.spaces.get(space_id).await.is_none());
    }

    /// E6-adjacent: a dead client's already-queued (not yet dispatched) work
    /// is discarded, never re-dispatched to anyone.
    #[tokio::test]
    async fn failing_a_server_purges_its_queued_ready_tasks() {
        let universe = scheduler();
        let (result_tx, _result_rx) = mpsc::unbounded_channel();
        let server_id = universe
            .register_server("http://127.0.0.1:0".into(), result_tx)
            .await;
        universe
            .state
            .push_ready(Task::new_leaf(
                TaskId::assign_universe(7, server_id, 1),
                0,
                "leaf",
                vec![],
            ))
            .await;

        fail_server(&universe, server_id).await;

        assert_eq!(universe.state.ready_len().await, 0);
        assert!(universe.servers.get(server_id).await.is_none());
    }

    /// The id-minting step must never hand two children the same id, and
    /// must repoint every child that targeted the old placeholder successor
    /// at the freshly minted one.
    #[tokio::test]
    async fn remint_coarse_result_assigns_distinct_ids_and_repoints_children() {
        let universe = scheduler();
        let origin_id = TaskId::assign_universe(3, 0, 0);
        let placeholder_successor = origin_id.as_successor();
        let successor = fabric_types::SuccessorTask::new_root(
            placeholder_successor.clone(),
            0,
            "sum",
            vec![],
            2,
            origin_id.clone(),
        );
        let children = vec![
            Task::new_leaf(TaskId::assign_universe(0, 0, 0), 0, "leaf", vec![])
                .routed_to(placeholder_successor.clone(), 0),
            Task::new_leaf(TaskId::assign_universe(0, 0, 0), 0, "leaf", vec![])
                .routed_to(placeholder_successor.clone(), 1),
        ];
        let coarse = fabric_types::CoarseResult {
            origin_task_id: origin_id.clone(),
            child_tasks: children,
            successor,
        };

        let reminted = remint_coarse_result(&universe, coarse);

        assert_ne!(reminted.child_tasks[0].id, reminted.child_tasks[1].id);
        assert_ne!(reminted.successor.id, placeholder_successor);
        for child in &reminted.child_tasks {
            assert_eq!(child.target_task_id, reminted.successor.id);
            assert_eq!(child.id.client_task_id, origin_id.client_task_id);
            assert_eq!(child.id.server_id, origin_id.server_id);
        }
    }
}
