use fabric_proto::proto;
use fabric_proto::proto::server_rpc_server::ServerRpcServer;
use fabric_proto::proto::universe_rpc_client::UniverseRpcClient;
use tokio::sync::{mpsc, oneshot};
use tonic::transport::Server;
use tonic::Request;
use tracing_subscriber::EnvFilter;

use fabric_demo::{Config, ServerService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load();

    let (task_tx, task_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();
    let service = ServerService::new(task_rx, done_tx);

    let addr = config.listen_addr.parse()?;
    tracing::info!(%addr, "demo server listening");
    tokio::spawn(async move {
        if let Err(e) = Server::builder()
            .add_service(ServerRpcServer::new(service))
            .serve(addr)
            .await
        {
            tracing::error!(error = %e, "demo server grpc listener failed");
        }
    });

    let mut universe_client = UniverseRpcClient::connect(config.universe_addr.clone()).await?;
    let response = universe_client
        .register_server(Request::new(proto::RegisterRequest {
            addr: config.advertise_addr(),
        }))
        .await?;
    let server_id = response.into_inner().id;
    tracing::info!(server_id, universe_addr = %config.universe_addr, "registered with universe");

    let job = proto::TaskMsg {
        id: "1".to_string(),
        layer: 0,
        coarse: true,
        kind: "fib".to_string(),
        body: serde_json::to_vec(&config.fib)?,
        args: Vec::new(),
        target_task_id: String::new(),
        target_slot: 0,
        origin_computer_id: None,
    };
    tracing::info!(n = config.fib, "submitting fib job");
    task_tx.send(job)?;

    let result = done_rx.await?;
    match result.kind {
        Some(proto::result_msg::Kind::Value(v)) => {
            let value: serde_json::Value = serde_json::from_slice(&v.value)?;
            println!("fib({}) = {value}", config.fib);
        }
        other => {
            tracing::warn!(?other, "expected a value result");
        }
    }

    Ok(())
}
