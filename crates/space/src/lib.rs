pub mod config;
pub mod grpc;
pub mod proxy;
pub mod scheduler;

pub use config::Config;
pub use scheduler::SpaceScheduler;
