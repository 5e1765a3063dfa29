//! End-to-end scenario E1: a single Computer, Space, and demo client wired
//! up over real (loopback) gRPC, computing one small Fibonacci number
//! through the full coarse/successor pipeline.

use std::future::Future;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tonic::transport::Server;
use tonic::Request;

use computer::grpc::ComputerService;
use computer::WorkerPool;
use fabric_demo::ServerService;
use fabric_proto::proto;
use fabric_proto::proto::computer_rpc_client::ComputerRpcClient;
use fabric_proto::proto::computer_rpc_server::ComputerRpcServer;
use fabric_proto::proto::server_rpc_client::ServerRpcClient;
use fabric_proto::proto::server_rpc_server::ServerRpcServer;
use fabric_proto::proto::space_rpc_client::SpaceRpcClient;
use fabric_proto::proto::space_rpc_server::SpaceRpcServer;
use fabric_proto::proto::universe_rpc_client::UniverseRpcClient;
use fabric_proto::proto::universe_rpc_server::UniverseRpcServer;
use space::grpc::SpaceService;
use space::SpaceScheduler;
use universe::grpc::UniverseService;
use universe::UniverseScheduler;

/// Grabs a free loopback port by briefly binding then dropping a std
/// listener. Good enough for a single-process test; a real deployment
/// never needs this.
fn free_addr() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

/// The grpc server tasks spawned below need a moment to start listening;
/// retry the client dial rather than racing it with a fixed sleep.
async fn connect_retrying<C, F, Fut>(addr: &str, connect: F) -> C
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<C, tonic::transport::Error>>,
{
    let url = format!("http://{addr}");
    for attempt in 0..100 {
        match connect(url.clone()).await {
            Ok(client) => return client,
            Err(_) if attempt < 99 => tokio::time::sleep(Duration::from_millis(20)).await,
            Err(e) => panic!("failed to connect to {addr}: {e}"),
        }
    }
    unreachable!()
}

#[tokio::test]
async fn fib_of_six_round_trips_through_the_full_fabric() {
    let universe_addr = free_addr();
    let universe = Arc::new(UniverseScheduler::new("/tmp/fabric-it-universe.recovery".into()));
    {
        let universe = universe.clone();
        let addr = universe_addr.parse().unwrap();
        tokio::spawn(async move {
            Server::builder()
                .add_service(UniverseRpcServer::new(UniverseService { universe }))
                .serve(addr)
                .await
                .unwrap();
        });
    }
    let mut universe_client =
        connect_retrying(&universe_addr, UniverseRpcClient::connect).await;

    let space_addr = free_addr();
    let registry = Arc::new(fabric_demo::registry());
    let space_scheduler = Arc::new(SpaceScheduler::new(0, registry.clone()));
    {
        let space_scheduler = space_scheduler.clone();
        let addr = space_addr.parse().unwrap();
        tokio::spawn(async move {
            Server::builder()
                .add_service(SpaceRpcServer::new(SpaceService {
                    space: space_scheduler,
                }))
                .serve(addr)
                .await
                .unwrap();
        });
    }
    let mut space_client: SpaceRpcClient<_> =
        connect_retrying(&space_addr, SpaceRpcClient::connect).await;
    universe_client
        .register_space(Request::new(proto::RegisterRequest {
            addr: format!("http://{space_addr}"),
        }))
        .await
        .unwrap();

    let computer_addr = free_addr();
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let pool = Arc::new(WorkerPool::spawn(2, registry, result_tx));
    {
        let addr = computer_addr.parse().unwrap();
        tokio::spawn(async move {
            Server::builder()
                .add_service(ComputerRpcServer::new(ComputerService::new(
                    pool, result_rx,
                )))
                .serve(addr)
                .await
                .unwrap();
        });
    }
    let _computer_client: ComputerRpcClient<_> =
        connect_retrying(&computer_addr, ComputerRpcClient::connect).await;
    space_client
        .register_computer(Request::new(proto::RegisterRequest {
            addr: format!("http://{computer_addr}"),
        }))
        .await
        .unwrap();

    let demo_addr = free_addr();
    let (task_tx, task_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = oneshot::channel();
    {
        let addr = demo_addr.parse().unwrap();
        let service = ServerService::new(task_rx, done_tx);
        tokio::spawn(async move {
            Server::builder()
                .add_service(ServerRpcServer::new(service))
                .serve(addr)
                .await
                .unwrap();
        });
    }
    let _demo_client: ServerRpcClient<_> =
        connect_retrying(&demo_addr, ServerRpcClient::connect).await;
    universe_client
        .register_server(Request::new(proto::RegisterRequest {
            addr: format!("http://{demo_addr}"),
        }))
        .await
        .unwrap();

    task_tx
        .send(proto::TaskMsg {
            id: "1".to_string(),
            layer: 0,
            coarse: true,
            kind: "fib".to_string(),
            body: serde_json::to_vec(&6u64).unwrap(),
            args: Vec::new(),
            target_task_id: String::new(),
            target_slot: 0,
            origin_computer_id: None,
        })
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), done_rx)
        .await
        .expect("final result should arrive within the timeout")
        .unwrap();

    match result.kind {
        Some(proto::result_msg::Kind::Value(v)) => {
            let value: serde_json::Value = serde_json::from_slice(&v.value).unwrap();
            assert_eq!(value, serde_json::Value::from(8));
        }
        other => panic!("expected a value result, got {other:?}"),
    }
}
