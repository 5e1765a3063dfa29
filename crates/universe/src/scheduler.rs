use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use fabric_core::{CheckpointSnapshot, PeerRegistry, SchedulerState};
use tokio::sync::mpsc;

use crate::proxy::{ServerProxy, SpaceProxy};

/// Top-level ready queue, successor map, registration tables, and
/// checkpointer — the Universe Scheduler of §4.3.
pub struct UniverseScheduler {
    pub state: SchedulerState,
    pub servers: PeerRegistry<ServerProxy>,
    pub spaces: PeerRegistry<SpaceProxy>,
    next_universe_seq: AtomicU64,
    pub recovery_path: PathBuf,
}

impl UniverseScheduler {
    pub fn new(recovery_path: PathBuf) -> Self {
        Self {
            state: SchedulerState::new(),
            servers: PeerRegistry::new(),
            spaces: PeerRegistry::new(),
            next_universe_seq: AtomicU64::new(0),
            recovery_path,
        }
    }

    pub fn next_universe_seq(&self) -> u64 {
        self.next_universe_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a final-result channel for a newly accepted Server, taking
    /// the next monotonic server id.
    pub async fn register_server(
        &self,
        addr: String,
        result_tx: mpsc::UnboundedSender<fabric_types::TaskResult>,
    ) -> u32 {
        self.servers
            .register(ServerProxy {
                addr,
                result_tx,
            })
            .await
    }

    pub async fn register_space(&self, addr: String) -> u32 {
        self.spaces
            .register(SpaceProxy {
                addr,
                running: fabric_core::RunningTaskMap::new(),
            })
            .await
    }

    pub async fn checkpoint(&self) -> CheckpointSnapshot {
        let (ready, successors) = self.state.snapshot().await;
        let mut server_addrs = Vec::new();
        for id in self.servers.ids().await {
            if let Some(p) = self.servers.get(id).await {
                server_addrs.push((id, p.addr.clone()));
            }
        }
        let mut space_addrs = Vec::new();
        for id in self.spaces.ids().await {
            if let Some(p) = self.spaces.get(id).await {
                space_addrs.push((id, p.addr.clone()));
            }
        }
        CheckpointSnapshot::new(ready, successors, server_addrs, space_addrs)
    }

    pub async fn restore(&self, snapshot: CheckpointSnapshot) {
        self.state.restore(snapshot.ready_queue, snapshot.successors).await;
        tracing::info!(
            servers = snapshot.server_addrs.len(),
            spaces = snapshot.space_addrs.len(),
            "recovery file listed peer addresses; peers must re-register on reconnect"
        );
    }
}
