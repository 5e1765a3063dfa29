use std::sync::Arc;

use fabric_proto::proto;
use fabric_proto::proto::space_rpc_server::SpaceRpcServer;
use fabric_proto::proto::universe_rpc_client::UniverseRpcClient;
use tonic::transport::Server;
use tonic::Request;
use tracing_subscriber::EnvFilter;

use space::config::Config;
use space::grpc::SpaceService;
use space::SpaceScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load();

    let mut universe_client = UniverseRpcClient::connect(config.universe_addr.clone()).await?;
    let response = universe_client
        .register_space(Request::new(proto::RegisterRequest {
            addr: config.advertise_addr(),
        }))
        .await?;
    let space_id = response.into_inner().id;
    tracing::info!(space_id, universe_addr = %config.universe_addr, "registered with universe");

    let registry = Arc::new(fabric_demo::registry());
    let scheduler = Arc::new(SpaceScheduler::new(space_id, registry));

    let addr = config.listen_addr.parse()?;
    tracing::info!(%addr, space_id, "space listening");

    let service = SpaceService {
        space: scheduler,
    };

    Server::builder()
        .add_service(SpaceRpcServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}
