//! The Universe's periodic recovery file: a schema-versioned `bincode`
//! snapshot of the ready queue, successor map, and registered peer
//! addresses. Connections are never resurrected from the file — only the
//! data needed to reconnect and resume scheduling.

use fabric_types::{FabricError, SuccessorTask, Task};
use serde::{Deserialize, Serialize};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    pub schema_version: u32,
    pub ready_queue: Vec<Task>,
    pub successors: Vec<SuccessorTask>,
    /// `(id, addr)` pairs; the peer itself reconnects and re-registers on
    /// restart, these are kept only for operator visibility in logs.
    pub server_addrs: Vec<(u32, String)>,
    pub space_addrs: Vec<(u32, String)>,
}

impl CheckpointSnapshot {
    pub fn new(
        ready_queue: Vec<Task>,
        successors: Vec<SuccessorTask>,
        server_addrs: Vec<(u32, String)>,
        space_addrs: Vec<(u32, String)>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ready_queue,
            successors,
            server_addrs,
            space_addrs,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FabricError> {
        bincode::serialize(self).map_err(|e| FabricError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FabricError> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| FabricError::Codec(e.to_string()))?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(FabricError::Codec(format!(
                "unsupported checkpoint schema version {}, expected {}",
                snapshot.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub async fn write_to(&self, path: &std::path::Path) -> Result<(), FabricError> {
        let bytes = self.to_bytes()?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| FabricError::Internal(e.into()))
    }

    pub async fn read_from(path: &std::path::Path) -> Result<Self, FabricError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| FabricError::Internal(e.into()))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_types::TaskId;

    #[test]
    fn round_trips_through_bytes() {
        let snapshot = CheckpointSnapshot::new(
            vec![Task::new_leaf(
                TaskId::assign_universe(1, 0, 1),
                0,
                "leaf",
                vec![],
            )],
            vec![SuccessorTask::new_root(
                TaskId::assign_universe(2, 0, 2).as_successor(),
                0,
                "sum",
                vec![],
                2,
                TaskId::assign_universe(2, 0, 2),
            )],
            vec![(0, "http://127.0.0.1:9001".into())],
            vec![],
        );
        let bytes = snapshot.to_bytes().unwrap();
        let restored = CheckpointSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored.ready_queue.len(), 1);
        assert_eq!(restored.successors.len(), 1);
        assert_eq!(restored.server_addrs, snapshot.server_addrs);
    }

    #[test]
    fn rejects_mismatched_schema_version() {
        let mut snapshot = CheckpointSnapshot::new(vec![], vec![], vec![], vec![]);
        snapshot.schema_version = 99;
        let bytes = bincode::serialize(&snapshot).unwrap();
        assert!(CheckpointSnapshot::from_bytes(&bytes).is_err());
    }
}
