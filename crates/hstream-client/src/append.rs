//! Append path: shard selection, route resolution, one data-plane call.

use hstream_proto as proto;
use tracing::{debug, warn};

use crate::ClientError;
use crate::client::{HStreamClient, rpc_error};
use crate::records::{encode_append_payloads, encode_records};
use crate::types::{AppendPayload, Payload, RecordId};

impl HStreamClient {
    /// Append `payloads` to the shard `key` maps to.
    ///
    /// Record ids come back in the same order as the payloads.
    pub async fn append<I, P>(
        &self,
        stream_name: &str,
        payloads: I,
        key: Option<&str>,
    ) -> Result<std::vec::IntoIter<RecordId>, ClientError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Payload>,
    {
        let records = encode_records(payloads, key)?;
        let shard_id = self.select_shard_for(stream_name, key).await?;
        self.append_records(stream_name, shard_id, records).await
    }

    /// Append a producer batch to an explicit shard. An empty batch is a no-op.
    pub async fn append_with_shard(
        &self,
        stream_name: &str,
        payloads: Vec<AppendPayload>,
        shard_id: u64,
    ) -> Result<std::vec::IntoIter<RecordId>, ClientError> {
        if payloads.is_empty() {
            warn!(stream = stream_name, shard_id, "empty payloads, append ignored");
            return Ok(Vec::new().into_iter());
        }

        let records = encode_append_payloads(payloads)?;
        self.append_records(stream_name, shard_id, records).await
    }

    async fn append_records(
        &self,
        stream_name: &str,
        shard_id: u64,
        records: Vec<proto::HStreamRecord>,
    ) -> Result<std::vec::IntoIter<RecordId>, ClientError> {
        let target = self.resolve_shard_target(stream_name, shard_id).await?;
        let mut stub = self.data_stub(&target)?;

        let count = records.len();
        let response = stub
            .append(proto::AppendRequest {
                stream_name: stream_name.to_string(),
                shard_id,
                records,
            })
            .await
            .map_err(rpc_error("append"))?
            .into_inner();

        debug!(
            stream = stream_name,
            shard_id,
            node = %target,
            records = count,
            "appended records"
        );
        let ids: Vec<RecordId> = response.record_ids.into_iter().map(RecordId::from).collect();
        Ok(ids.into_iter())
    }
}
