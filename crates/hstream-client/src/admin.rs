//! Stream and shard administration on the control plane.

use hstream_proto as proto;
use tracing::debug;

use crate::ClientError;
use crate::client::{HStreamClient, rpc_error};
use crate::shard::select_shard;
use crate::types::{Shard, Stream};

impl HStreamClient {
    /// Create a stream. `Stream::new(name)` carries the defaults: replication
    /// factor 1, no backlog retention, one shard.
    pub async fn create_stream(&self, stream: &Stream) -> Result<(), ClientError> {
        let request = proto::Stream::from(stream);
        self.with_failover(|mut stub| {
            let request = request.clone();
            async move {
                stub.create_stream(request)
                    .await
                    .map_err(rpc_error("create stream"))?;
                Ok(())
            }
        })
        .await?;

        debug!(stream = %stream.name, shards = stream.shard_count, "created stream");
        Ok(())
    }

    pub async fn delete_stream(
        &self,
        name: &str,
        ignore_missing: bool,
        force: bool,
    ) -> Result<(), ClientError> {
        let request = proto::DeleteStreamRequest {
            stream_name: name.to_string(),
            ignore_non_exist: ignore_missing,
            force,
        };
        self.with_failover(|mut stub| {
            let request = request.clone();
            async move {
                stub.delete_stream(request)
                    .await
                    .map_err(rpc_error("delete stream"))?;
                Ok(())
            }
        })
        .await
    }

    pub async fn list_streams(&self) -> Result<std::vec::IntoIter<Stream>, ClientError> {
        let response = self
            .with_failover(|mut stub| async move {
                stub.list_streams(proto::ListStreamsRequest {})
                    .await
                    .map_err(rpc_error("list streams"))
                    .map(tonic::Response::into_inner)
            })
            .await?;

        let streams: Vec<Stream> = response.streams.into_iter().map(Stream::from).collect();
        Ok(streams.into_iter())
    }

    /// Shards of `stream_name`, fetched once and then served from the cache.
    pub async fn list_shards(&self, stream_name: &str) -> Result<Vec<Shard>, ClientError> {
        if let Some(shards) = self.shard_lists().get(stream_name) {
            return Ok(shards);
        }

        let request = proto::ListShardsRequest {
            stream_name: stream_name.to_string(),
        };
        let response = self
            .with_failover(|mut stub| {
                let request = request.clone();
                async move {
                    stub.list_shards(request)
                        .await
                        .map_err(rpc_error("list shards"))
                        .map(tonic::Response::into_inner)
                }
            })
            .await?;

        let shards: Vec<Shard> = response.shards.into_iter().map(Shard::from).collect();
        debug!(stream = stream_name, shards = shards.len(), "fetched shard list");
        self.shard_lists().insert(stream_name, shards.clone());
        Ok(shards)
    }

    /// Drop the cached shard list so the next lookup asks the server again.
    pub fn forget_shards(&self, stream_name: &str) -> bool {
        self.shard_lists().forget(stream_name)
    }

    /// Shard a record with `key` belongs to.
    pub async fn select_shard_for(
        &self,
        stream_name: &str,
        key: Option<&str>,
    ) -> Result<u64, ClientError> {
        let shards = self.list_shards(stream_name).await?;
        select_shard(&shards, key).map_err(|err| match err {
            ClientError::NoMatchingShard { key, .. } => ClientError::NoMatchingShard {
                stream: stream_name.to_string(),
                key,
            },
            other => other,
        })
    }
}
