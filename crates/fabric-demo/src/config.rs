use clap::Parser;

/// A minimal demo client: submits one `fib(n)` job to a Universe and
/// prints the final answer.
#[derive(Parser, Debug)]
#[command(name = "fabric-demo-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address this demo client's gRPC server binds to.
    #[arg(long, env = "DEMO_LISTEN_ADDR", default_value = "0.0.0.0:7300")]
    pub listen_addr: String,

    /// Address advertised to the Universe at registration time.
    #[arg(long, env = "DEMO_ADVERTISE_ADDR")]
    pub advertise_addr: Option<String>,

    /// Universe address to register with.
    #[arg(long, env = "DEMO_UNIVERSE_ADDR", default_value = "http://127.0.0.1:7000")]
    pub universe_addr: String,

    /// Which Fibonacci number to compute.
    #[arg(long, env = "DEMO_FIB_N", default_value_t = 10)]
    pub fib: u64,
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
