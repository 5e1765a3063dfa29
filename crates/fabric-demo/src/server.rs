//! The Server tier (§1's "client"): hosts `ServerRpc` for the Universe's
//! Server Proxy to dial into, and is itself the origin and final
//! destination of one coarse task.

use fabric_proto::proto;
use fabric_proto::proto::server_rpc_server::ServerRpc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::{Request, Response, Status};
use tracing::info;

pub struct ServerService {
    task_rx: Mutex<Option<mpsc::UnboundedReceiver<proto::TaskMsg>>>,
    done_tx: Mutex<Option<oneshot::Sender<proto::ResultMsg>>>,
}

impl ServerService {
    pub fn new(
        task_rx: mpsc::UnboundedReceiver<proto::TaskMsg>,
        done_tx: oneshot::Sender<proto::ResultMsg>,
    ) -> Self {
        Self {
            task_rx: Mutex::new(Some(task_rx)),
            done_tx: Mutex::new(Some(done_tx)),
        }
    }
}

#[tonic::async_trait]
impl ServerRpc for ServerService {
    type GetTaskStream = UnboundedReceiverStream<Result<proto::TaskMsg, Status>>;

    /// Taken exactly once, by the Universe's Server Proxy.
    async fn get_task(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<Self::GetTaskStream>, Status> {
        let Some(mut task_rx) = self.task_rx.lock().await.take() else {
            return Err(Status::failed_precondition(
                "GetTask already claimed by another caller",
            ));
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(task) = task_rx.recv().await {
                if tx.send(Ok(task)).is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(UnboundedReceiverStream::new(rx)))
    }

    async fn dispatch_result(
        &self,
        request: Request<proto::ResultMsg>,
    ) -> Result<Response<proto::Ack>, Status> {
        let msg = request.into_inner();
        info!("received final result from universe");
        if let Some(done_tx) = self.done_tx.lock().await.take() {
            let _ = done_tx.send(msg);
        }
        Ok(Response::new(proto::Ack { ok: true }))
    }
}
