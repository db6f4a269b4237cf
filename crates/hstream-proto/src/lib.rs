//! Shared Protocol Buffer definitions for the HStream client.
//!
//! Holds the generated messages and the `HStreamApi` client/server stubs for
//! the cluster's control-plane and data-plane calls.

// Generated protobuf modules via `tonic_build` in build.rs

/// HStream server API protocol
pub mod hstream {
    pub mod server {
        tonic::include_proto!("hstream.server");
    }
}

// Re-export API types for convenience
pub use hstream::server::*;

pub use hstream::server::h_stream_api_client::HStreamApiClient;
pub use hstream::server::h_stream_api_server::{HStreamApi, HStreamApiServer};
