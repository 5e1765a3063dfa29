use std::sync::Arc;

use fabric_proto::proto;
use fabric_proto::proto::space_rpc_server::SpaceRpc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::proxy::spawn_computer_proxy;
use crate::scheduler::SpaceScheduler;

pub struct SpaceService {
    pub space: Arc<SpaceScheduler>,
}

#[tonic::async_trait]
impl SpaceRpc for SpaceService {
    async fn add_task(
        &self,
        request: Request<proto::TaskMsg>,
    ) -> Result<Response<proto::Ack>, Status> {
        let task = fabric_core::codec::task_from_proto(request.into_inner())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.space.state.push_ready(task).await;
        Ok(Response::new(proto::Ack { ok: true }))
    }

    type GetResultStream = UnboundedReceiverStream<Result<proto::ResultMsg, Status>>;

    /// Taken exactly once, per §4.4's single-consumer contract: the
    /// Universe's Space Proxy is the only caller that ever holds this
    /// stream open.
    async fn get_result(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<Self::GetResultStream>, Status> {
        let Some(mut result_rx) = self.space.take_result_rx().await else {
            return Err(Status::failed_precondition(
                "GetResult already claimed by another caller",
            ));
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(result) = result_rx.recv().await {
                let msg = match fabric_core::codec::result_to_proto(&result) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "failed to encode result for universe");
                        continue;
                    }
                };
                if tx.send(Ok(msg)).is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(UnboundedReceiverStream::new(rx)))
    }

    async fn register_computer(
        &self,
        request: Request<proto::RegisterRequest>,
    ) -> Result<Response<proto::RegisterResponse>, Status> {
        let addr = request.into_inner().addr;
        let (intermediate_tx, intermediate_rx) = mpsc::unbounded_channel();
        let computer = crate::proxy::ComputerProxy {
            addr: addr.clone(),
            running: fabric_core::RunningTaskMap::new(),
            intermediate_tx,
        };
        let id = self.space.computers.register(computer).await;
        info!(computer_id = id, %addr, "computer registered");
        spawn_computer_proxy(self.space.clone(), id, addr, intermediate_rx);
        Ok(Response::new(proto::RegisterResponse { id }))
    }
}
