use std::sync::Arc;

use fabric_proto::proto;
use fabric_proto::proto::computer_rpc_server::ComputerRpcServer;
use fabric_proto::proto::space_rpc_client::SpaceRpcClient;
use tokio::sync::mpsc;
use tonic::transport::Server;
use tonic::Request;
use tracing_subscriber::EnvFilter;

use computer::config::Config;
use computer::grpc::ComputerService;
use computer::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load();

    let mut space_client = SpaceRpcClient::connect(config.space_addr.clone()).await?;
    let response = space_client
        .register_computer(Request::new(proto::RegisterRequest {
            addr: config.advertise_addr(),
        }))
        .await?;
    let computer_id = response.into_inner().id;
    tracing::info!(computer_id, space_addr = %config.space_addr, "registered with space");

    let registry = Arc::new(fabric_demo::registry());
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let pool = Arc::new(WorkerPool::spawn(config.workers, registry, result_tx));

    let addr = config.listen_addr.parse()?;
    tracing::info!(%addr, computer_id, workers = config.workers, "computer listening");

    let service = ComputerService::new(pool, result_rx);

    Server::builder()
        .add_service(ComputerRpcServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}
