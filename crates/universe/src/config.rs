use clap::Parser;

/// Launches the root scheduler of the fabric.
#[derive(Parser, Debug)]
#[command(name = "universe")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address this Universe's gRPC server binds to.
    #[arg(long, env = "UNIVERSE_LISTEN_ADDR", default_value = "0.0.0.0:7000")]
    pub listen_addr: String,

    /// Reload `readyQueue` and `successorMap` from the recovery file on
    /// startup instead of starting empty.
    #[arg(long, env = "UNIVERSE_RECOVER", default_value_t = false)]
    pub recover: bool,

    /// Path to the recovery file, rewritten every 10 seconds.
    #[arg(
        long,
        env = "UNIVERSE_RECOVERY_PATH",
        default_value = "universe.recovery"
    )]
    pub recovery_path: std::path::PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Config::parse()
    }
}
