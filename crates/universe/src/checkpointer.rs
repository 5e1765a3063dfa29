use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::scheduler::UniverseScheduler;

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(10);

/// Rewrites the recovery file every 10 seconds for as long as the Universe
/// runs.
pub async fn run(universe: Arc<UniverseScheduler>) {
    let mut ticker = tokio::time::interval(CHECKPOINT_INTERVAL);
    loop {
        ticker.tick().await;
        let snapshot = universe.checkpoint().await;
        match snapshot.write_to(&universe.recovery_path).await {
            Ok(()) => info!(
                path = %universe.recovery_path.display(),
                ready = snapshot.ready_queue.len(),
                successors = snapshot.successors.len(),
                "checkpoint written"
            ),
            Err(e) => warn!(error = %e, "checkpoint write failed"),
        }
    }
}
