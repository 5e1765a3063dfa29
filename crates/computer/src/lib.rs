pub mod config;
pub mod grpc;
pub mod pool;

pub use config::Config;
pub use pool::WorkerPool;
