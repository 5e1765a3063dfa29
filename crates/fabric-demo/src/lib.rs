pub mod config;
pub mod fib;
pub mod server;

pub use config::Config;
pub use fib::{registry, DemoRegistry};
pub use server::ServerService;
