use clap::Parser;

/// Launches an intermediate scheduler that registers with a Universe and
/// owns a pool of Computers.
#[derive(Parser, Debug)]
#[command(name = "space")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address this Space's gRPC server binds to.
    #[arg(long, env = "SPACE_LISTEN_ADDR", default_value = "0.0.0.0:7100")]
    pub listen_addr: String,

    /// Address advertised to the Universe at registration time.
    #[arg(long, env = "SPACE_ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    /// Universe address to register with.
    #[arg(long, env = "SPACE_UNIVERSE_ADDR", default_value = "http://127.0.0.1:7000")]
    pub universe_addr: String,
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
