//! Generated gRPC bindings for the inter-tier wire protocol.

pub mod proto {
    tonic::include_proto!("fabric.v1");
}
