use clap::Parser;

/// Launches a worker process backed by a fixed local thread pool.
#[derive(Parser, Debug)]
#[command(name = "computer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address this Computer's gRPC server binds to.
    #[arg(long, env = "COMPUTER_LISTEN_ADDR", default_value = "0.0.0.0:7200")]
    pub listen_addr: String,

    /// Address advertised to the Space at registration time.
    #[arg(long, env = "COMPUTER_ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    /// Space address to register with.
    #[arg(long, env = "COMPUTER_SPACE_ADDR", default_value = "http://127.0.0.1:7100")]
    pub space_addr: String,

    /// Number of local worker threads.
    #[arg(long, env = "COMPUTER_WORKERS", default_value_t = 4)]
    pub workers: usize,
}

impl Config {
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Config::parse()
    }

    pub fn advertise_addr(&self) -> String {
        self.advertise_addr
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen_addr))
    }
}
