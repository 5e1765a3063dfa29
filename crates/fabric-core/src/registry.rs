//! Monotonically-ID'd peer registries: `serverProxies`, `spaceProxies`,
//! `computerProxies`. IDs are never reused within a process's lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

pub struct PeerRegistry<P> {
    next_id: AtomicU32,
    peers: RwLock<HashMap<u32, Arc<P>>>,
}

impl<P> Default for PeerRegistry<P> {
    fn default() -> Self {
        Self {
            next_id: AtomicU32::new(0),
            peers: RwLock::new(HashMap::new()),
        }
    }
}

impl<P> PeerRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id and register `peer` under it.
    pub async fn register(&self, peer: P) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.peers.write().await.insert(id, Arc::new(peer));
        id
    }

    pub async fn get(&self, id: u32) -> Option<Arc<P>> {
        self.peers.read().await.get(&id).cloned()
    }

    pub async fn unregister(&self, id: u32) -> Option<Arc<P>> {
        self.peers.write().await.remove(&id)
    }

    pub async fn ids(&self) -> Vec<u32> {
        self.peers.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }
}
