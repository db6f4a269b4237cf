//! Shard reader lifecycle and the scoped reader helper.

use hstream_proto as proto;
use std::future::Future;
use tracing::{debug, warn};

use crate::ClientError;
use crate::client::{HStreamClient, rpc_error};
use crate::records::decode_received;
use crate::types::{Record, ReaderConfig};

impl HStreamClient {
    /// Create a reader on the control plane.
    ///
    /// Without an explicit shard the shard is derived from the key on every
    /// call; it is not remembered per reader.
    pub async fn create_reader(&self, config: &ReaderConfig) -> Result<(), ClientError> {
        let shard_id = match config.shard_id {
            Some(shard_id) => shard_id,
            None => {
                self.select_shard_for(&config.stream_name, config.key.as_deref())
                    .await?
            }
        };

        let request = proto::CreateShardReaderRequest {
            stream_name: config.stream_name.clone(),
            shard_id,
            shard_offset: Some(config.offset.into()),
            reader_id: config.reader_id.clone(),
            timeout: u32::try_from(config.timeout.as_millis()).unwrap_or(u32::MAX),
        };
        self.with_failover(|mut stub| {
            let request = request.clone();
            async move {
                stub.create_shard_reader(request)
                    .await
                    .map_err(rpc_error("create shard reader"))?;
                Ok(())
            }
        })
        .await?;

        debug!(
            reader_id = %config.reader_id,
            stream = %config.stream_name,
            shard_id,
            "created reader"
        );
        Ok(())
    }

    /// One poll of the reader. Call again for more data.
    pub async fn read_reader(
        &self,
        reader_id: &str,
        max_records: u64,
    ) -> Result<std::vec::IntoIter<Record>, ClientError> {
        let target = self.resolve_reader_target(reader_id).await?;
        let mut stub = self.data_stub(&target)?;
        let response = stub
            .read_shard(proto::ReadShardRequest {
                reader_id: reader_id.to_string(),
                max_records,
            })
            .await
            .map_err(rpc_error("read shard"))?
            .into_inner();

        let records = decode_received(response.received_records)?;
        debug!(reader_id, node = %target, records = records.len(), "read shard");
        Ok(records.into_iter())
    }

    pub async fn delete_reader(&self, reader_id: &str) -> Result<(), ClientError> {
        let target = self.resolve_reader_target(reader_id).await?;
        let mut stub = self.data_stub(&target)?;
        stub.delete_shard_reader(proto::DeleteShardReaderRequest {
            reader_id: reader_id.to_string(),
        })
        .await
        .map_err(rpc_error("delete shard reader"))?;

        debug!(reader_id, node = %target, "deleted reader");
        Ok(())
    }

    /// Create a reader, run `body` with a read-only handle, then delete it.
    ///
    /// The delete runs exactly once whether `body` succeeds, fails, panics or
    /// is cancelled. On cancellation it is spawned onto the current runtime.
    pub async fn with_reader<T, F, Fut>(&self, config: ReaderConfig, body: F) -> Result<T, ClientError>
    where
        F: FnOnce(ReaderHandle) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.create_reader(&config).await?;
        let guard = ReaderGuard {
            client: Some(self.clone()),
            reader_id: config.reader_id.clone(),
        };

        let outcome = body(ReaderHandle {
            client: self.clone(),
            reader_id: config.reader_id,
        })
        .await;

        match (outcome, guard.release().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup)) => {
                warn!(error = %cleanup, "deleting reader after failed body also failed");
                Err(err)
            }
        }
    }
}

/// Read access to a reader owned by [`HStreamClient::with_reader`].
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    client: HStreamClient,
    reader_id: String,
}

impl ReaderHandle {
    pub fn reader_id(&self) -> &str {
        &self.reader_id
    }

    pub async fn read(&self, max_records: u64) -> Result<std::vec::IntoIter<Record>, ClientError> {
        self.client.read_reader(&self.reader_id, max_records).await
    }
}

/// Deletes its reader once: explicitly via `release`, otherwise on drop.
struct ReaderGuard {
    client: Option<HStreamClient>,
    reader_id: String,
}

impl ReaderGuard {
    /// Delete the reader on its own task so cancelling the caller mid-delete
    /// cannot abandon it.
    async fn release(mut self) -> Result<(), ClientError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        let reader_id = std::mem::take(&mut self.reader_id);

        let delete = tokio::spawn(async move { client.delete_reader(&reader_id).await });
        match delete.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(ClientError::Io {
                context: "deleting reader".to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let reader_id = std::mem::take(&mut self.reader_id);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = client.delete_reader(&reader_id).await {
                        warn!(reader_id = %reader_id, error = %err, "failed to delete abandoned reader");
                    }
                });
            }
            Err(_) => warn!(reader_id = %reader_id, "no runtime to delete abandoned reader"),
        }
    }
}
