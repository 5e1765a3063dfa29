use std::sync::Arc;

use fabric_proto::proto;
use fabric_proto::proto::computer_rpc_server::ComputerRpc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::{Request, Response, Status};
use tracing::warn;

use crate::pool::WorkerPool;

pub struct ComputerService {
    pub pool: Arc<WorkerPool>,
    result_rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<fabric_types::TaskResult>>>,
}

impl ComputerService {
    pub fn new(
        pool: Arc<WorkerPool>,
        result_rx: mpsc::UnboundedReceiver<fabric_types::TaskResult>,
    ) -> Self {
        Self {
            pool,
            result_rx: tokio::sync::Mutex::new(Some(result_rx)),
        }
    }
}

#[tonic::async_trait]
impl ComputerRpc for ComputerService {
    async fn add_task(
        &self,
        request: Request<proto::TaskMsg>,
    ) -> Result<Response<proto::Ack>, Status> {
        let task = fabric_core::codec::task_from_proto(request.into_inner())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.submit(task))
            .await
            .map_err(|e| Status::internal(e.to_string()))?
            .map_err(|_| Status::resource_exhausted("worker queue closed"))?;
        Ok(Response::new(proto::Ack { ok: true }))
    }

    type GetResultStream = UnboundedReceiverStream<Result<proto::ResultMsg, Status>>;

    async fn get_result(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<Self::GetResultStream>, Status> {
        let Some(mut result_rx) = self.result_rx.lock().await.take() else {
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
                        warn!(error = %e, "failed to encode result for space");
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

    async fn is_busy(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::BusyReply>, Status> {
        Ok(Response::new(proto::BusyReply {
            busy: self.pool.is_busy(),
        }))
    }

    async fn get_worker_num(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::WorkerNumReply>, Status> {
        Ok(Response::new(proto::WorkerNumReply {
            count: self.pool.worker_count() as u32,
        }))
    }
}
