//! The scheduling engine shared by the Universe and Space tiers: the
//! ready-queue/successor-map pair, per-proxy running-task tracking,
//! monotonic peer registries, checkpointing, and the proto codec.

pub mod checkpoint;
pub mod codec;
pub mod registry;
pub mod running;
pub mod scheduler;

pub use checkpoint::CheckpointSnapshot;
pub use registry::PeerRegistry;
pub use running::RunningTaskMap;
pub use scheduler::{ProcessOutcome, SchedulerState};
