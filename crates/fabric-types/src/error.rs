use thiserror::Error;

/// Errors surfaced by the core scheduling/routing machinery.
///
/// RPC handlers (in `universe`, `space`, `computer`) translate these into
/// `tonic::Status` at the boundary; nothing below that boundary should ever
/// need to know about gRPC.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("peer not registered: {0}")]
    NotRegistered(String),

    #[error("unknown task kind: {0}")]
    UnknownTaskKind(String),

    #[error("malformed task id: {0}")]
    BadTaskId(#[from] crate::task_id::TaskIdParseError),

    #[error("transport failure talking to {peer}: {source}")]
    Transport {
        peer: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("codec error: {0}")]
    Codec(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
