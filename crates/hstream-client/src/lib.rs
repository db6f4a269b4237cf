//! HStream client: routing and failover over a sharded, multi-node stream store.
//!
//! [`HStreamClient`] discovers the cluster from one seed node, keeps one
//! channel per node, and caches which node serves each shard, subscription and
//! reader. Control-plane calls that hit an unavailable node rebind to another
//! known node and are retried once.
//!
//! ```rust,ignore
//! use hstream_client::{ClientConfig, HStreamClient, Stream};
//!
//! let client = HStreamClient::connect(ClientConfig::from_url("hstream://127.0.0.1:6570")?).await?;
//! client.create_stream(&Stream::new("orders").with_shard_count(4)).await?;
//! let ids: Vec<_> = client.append("orders", ["p1", "p2"], Some("acct-1")).await?.collect();
//! ```

pub mod admin;
pub mod append;
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod failover;
pub mod pool;
pub mod reader;
pub mod records;
pub mod routing;
pub mod shard;
pub mod subscription;
pub mod telemetry;
pub mod types;

pub use client::{ApiStub, HStreamClient};
pub use config::{ClientConfig, ClientSettings, TlsMaterial};
pub use consumer::{Consumer, RecordHandler, StubFactory};
pub use error::ClientError;
pub use pool::{ChannelPool, TargetState};
pub use reader::ReaderHandle;
pub use shard::select_shard;
pub use types::{
    AppendPayload, NodeTarget, Payload, ReaderConfig, Record, RecordId, Shard, ShardOffset,
    SpecialOffset, Stream, Subscription,
};
