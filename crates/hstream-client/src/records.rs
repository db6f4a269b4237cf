//! Conversion between application payloads and wire records.

use hstream_proto as proto;

use crate::ClientError;
use crate::types::{AppendPayload, Payload, Record, RecordId};

fn encode_one(payload: Payload, key: Option<&str>) -> Result<proto::HStreamRecord, ClientError> {
    let (flag, bytes) = match payload {
        Payload::Raw(bytes) => (proto::RecordFlag::Raw, bytes),
        Payload::Json(value) => {
            let bytes = serde_json::to_vec(&value).map_err(|e| ClientError::Decode {
                context: "JSON payload".to_string(),
                reason: e.to_string(),
            })?;
            (proto::RecordFlag::Json, bytes)
        }
    };

    let mut header = proto::RecordHeader {
        key: key.unwrap_or_default().to_string(),
        ..Default::default()
    };
    header.set_flag(flag);

    Ok(proto::HStreamRecord {
        header: Some(header),
        payload: bytes,
    })
}

/// Encode a batch that shares one key.
pub fn encode_records<I, P>(payloads: I, key: Option<&str>) -> Result<Vec<proto::HStreamRecord>, ClientError>
where
    I: IntoIterator<Item = P>,
    P: Into<Payload>,
{
    payloads
        .into_iter()
        .map(|p| encode_one(p.into(), key))
        .collect()
}

/// Encode a producer batch where every payload carries its own key.
pub fn encode_append_payloads(
    payloads: Vec<AppendPayload>,
) -> Result<Vec<proto::HStreamRecord>, ClientError> {
    payloads
        .into_iter()
        .map(|p| encode_one(p.payload, p.key.as_deref()))
        .collect()
}

pub fn decode_record(id: RecordId, record: proto::HStreamRecord) -> Result<Record, ClientError> {
    let header = record.header.unwrap_or_default();
    let payload = match header.flag() {
        proto::RecordFlag::Raw => Payload::Raw(record.payload),
        proto::RecordFlag::Json => {
            let value = serde_json::from_slice(&record.payload).map_err(|e| ClientError::Decode {
                context: format!("record {id}"),
                reason: e.to_string(),
            })?;
            Payload::Json(value)
        }
    };

    Ok(Record {
        id,
        key: header.key,
        payload,
    })
}

/// Flatten one read response into records, pairing ids and records by position.
pub fn decode_received(
    batches: Vec<proto::ReceivedRecord>,
) -> Result<Vec<Record>, ClientError> {
    let mut records = Vec::new();
    for batch in batches {
        if batch.record_ids.len() != batch.records.len() {
            return Err(ClientError::MalformedResponse {
                context: "read shard".to_string(),
                reason: format!(
                    "{} record ids for {} records",
                    batch.record_ids.len(),
                    batch.records.len()
                ),
            });
        }
        for (id, record) in batch.record_ids.into_iter().zip(batch.records) {
            records.push(decode_record(id.into(), record)?);
        }
    }
    Ok(records)
}
