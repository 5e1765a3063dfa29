use std::sync::Arc;

use fabric_core::CheckpointSnapshot;
use fabric_proto::proto::universe_rpc_server::UniverseRpcServer;
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;
use universe::config::Config;
use universe::grpc::UniverseService;
use universe::{checkpointer, UniverseScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load();
    let scheduler = Arc::new(UniverseScheduler::new(config.recovery_path.clone()));

    if config.recover {
        match CheckpointSnapshot::read_from(&config.recovery_path).await {
            Ok(snapshot) => {
                tracing::info!(path = %config.recovery_path.display(), "recovery file loaded");
                scheduler.restore(snapshot).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "recovery file read failed, starting fresh");
            }
        }
    }

    tokio::spawn(checkpointer::run(scheduler.clone()));

    let addr = config.listen_addr.parse()?;
    tracing::info!(%addr, "universe listening");

    let service = UniverseService {
        universe: scheduler,
    };

    Server::builder()
        .add_service(UniverseRpcServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}
