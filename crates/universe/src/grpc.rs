use std::sync::Arc;

use fabric_proto::proto;
use fabric_proto::proto::universe_rpc_server::UniverseRpc;
use tokio::sync::mpsc;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::proxy::{spawn_server_proxy, spawn_space_proxy};
use crate::scheduler::UniverseScheduler;

pub struct UniverseService {
    pub universe: Arc<UniverseScheduler>,
}

#[tonic::async_trait]
impl UniverseRpc for UniverseService {
    async fn register_server(
        &self,
        request: Request<proto::RegisterRequest>,
    ) -> Result<Response<proto::RegisterResponse>, Status> {
        let addr = request.into_inner().addr;
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let id = self.universe.register_server(addr.clone(), result_tx).await;
        info!(server_id = id, %addr, "server registered");
        spawn_server_proxy(self.universe.clone(), id, addr, result_rx);
        Ok(Response::new(proto::RegisterResponse { id }))
    }

    async fn register_space(
        &self,
        request: Request<proto::RegisterRequest>,
    ) -> Result<Response<proto::RegisterResponse>, Status> {
        let addr = request.into_inner().addr;
        let id = self.universe.register_space(addr.clone()).await;
        info!(space_id = id, %addr, "space registered");
        spawn_space_proxy(self.universe.clone(), id, addr);
        Ok(Response::new(proto::RegisterResponse { id }))
    }
}
