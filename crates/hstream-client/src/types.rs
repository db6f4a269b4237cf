//! Core types for streams, shards, subscriptions, readers and records.

use hstream_proto as proto;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::ClientError;

/// Port HStream nodes listen on when none is given.
pub const DEFAULT_PORT: u16 = 6570;

/// One reachable cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeTarget {
    pub host: String,
    pub port: u16,
}

impl NodeTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl TryFrom<proto::ServerNode> for NodeTarget {
    type Error = ClientError;

    fn try_from(node: proto::ServerNode) -> Result<Self, Self::Error> {
        let port = u16::try_from(node.port).map_err(|_| ClientError::MalformedResponse {
            context: format!("server node {}", node.id),
            reason: format!("port {} out of range", node.port),
        })?;
        Ok(NodeTarget::new(node.host, port))
    }
}

/// A named, partitioned log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub name: String,
    pub replication_factor: u32,
    /// How long appended records are retained.
    pub backlog_duration: Duration,
    pub shard_count: u32,
}

impl Stream {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replication_factor: 1,
            backlog_duration: Duration::ZERO,
            shard_count: 1,
        }
    }

    pub fn with_replication_factor(mut self, replication_factor: u32) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_backlog_duration(mut self, backlog_duration: Duration) -> Self {
        self.backlog_duration = backlog_duration;
        self
    }

    pub fn with_shard_count(mut self, shard_count: u32) -> Self {
        self.shard_count = shard_count;
        self
    }
}

impl From<proto::Stream> for Stream {
    fn from(s: proto::Stream) -> Self {
        Self {
            name: s.stream_name,
            replication_factor: s.replication_factor,
            backlog_duration: Duration::from_secs(u64::from(s.backlog_duration)),
            shard_count: s.shard_count,
        }
    }
}

impl From<&Stream> for proto::Stream {
    fn from(s: &Stream) -> Self {
        Self {
            stream_name: s.name.clone(),
            replication_factor: s.replication_factor,
            backlog_duration: saturating_u32(s.backlog_duration.as_secs()),
            shard_count: s.shard_count,
        }
    }
}

/// One partition of a stream, owning an inclusive range of the key hash space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub stream_name: String,
    pub shard_id: u64,
    pub start_hash_range_key: String,
    pub end_hash_range_key: String,
}

impl From<proto::Shard> for Shard {
    fn from(s: proto::Shard) -> Self {
        Self {
            stream_name: s.stream_name,
            shard_id: s.shard_id,
            start_hash_range_key: s.start_hash_range_key,
            end_hash_range_key: s.end_hash_range_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpecialOffset {
    Earliest,
    #[default]
    Latest,
}

impl From<SpecialOffset> for proto::SpecialOffset {
    fn from(offset: SpecialOffset) -> Self {
        match offset {
            SpecialOffset::Earliest => proto::SpecialOffset::Earliest,
            SpecialOffset::Latest => proto::SpecialOffset::Latest,
        }
    }
}

impl From<proto::SpecialOffset> for SpecialOffset {
    fn from(offset: proto::SpecialOffset) -> Self {
        match offset {
            proto::SpecialOffset::Earliest => SpecialOffset::Earliest,
            proto::SpecialOffset::Latest => SpecialOffset::Latest,
        }
    }
}

/// Position within a shard, either a well-known end or a concrete record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardOffset {
    Special(SpecialOffset),
    Record(RecordId),
}

impl From<ShardOffset> for proto::ShardOffset {
    fn from(offset: ShardOffset) -> Self {
        let offset = match offset {
            ShardOffset::Special(special) => {
                proto::shard_offset::Offset::SpecialOffset(proto::SpecialOffset::from(special) as i32)
            }
            ShardOffset::Record(id) => proto::shard_offset::Offset::RecordOffset(id.into()),
        };
        proto::ShardOffset {
            offset: Some(offset),
        }
    }
}

/// Identifies one appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub shard_id: u64,
    pub batch_id: u64,
    pub batch_index: u32,
}

impl From<proto::RecordId> for RecordId {
    fn from(id: proto::RecordId) -> Self {
        Self {
            shard_id: id.shard_id,
            batch_id: id.batch_id,
            batch_index: id.batch_index,
        }
    }
}

impl From<RecordId> for proto::RecordId {
    fn from(id: RecordId) -> Self {
        Self {
            shard_id: id.shard_id,
            batch_id: id.batch_id,
            batch_index: id.batch_index,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.shard_id, self.batch_id, self.batch_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub stream_name: String,
    pub ack_timeout: Duration,
    pub max_unacked_records: u32,
    pub offset: SpecialOffset,
}

impl Subscription {
    pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(600);
    pub const DEFAULT_MAX_UNACKED_RECORDS: u32 = 10_000;

    pub fn new(subscription_id: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            stream_name: stream_name.into(),
            ack_timeout: Self::DEFAULT_ACK_TIMEOUT,
            max_unacked_records: Self::DEFAULT_MAX_UNACKED_RECORDS,
            offset: SpecialOffset::Latest,
        }
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn with_max_unacked_records(mut self, max_unacked_records: u32) -> Self {
        self.max_unacked_records = max_unacked_records;
        self
    }

    pub fn with_offset(mut self, offset: SpecialOffset) -> Self {
        self.offset = offset;
        self
    }
}

impl From<proto::Subscription> for Subscription {
    fn from(s: proto::Subscription) -> Self {
        let offset = s.offset().into();
        Self {
            subscription_id: s.subscription_id,
            stream_name: s.stream_name,
            ack_timeout: Duration::from_secs(u64::try_from(s.ack_timeout_seconds).unwrap_or(0)),
            max_unacked_records: u32::try_from(s.max_unacked_records).unwrap_or(0),
            offset,
        }
    }
}

impl From<&Subscription> for proto::Subscription {
    fn from(s: &Subscription) -> Self {
        let mut wire = Self {
            subscription_id: s.subscription_id.clone(),
            stream_name: s.stream_name.clone(),
            ack_timeout_seconds: i32::try_from(s.ack_timeout.as_secs()).unwrap_or(i32::MAX),
            max_unacked_records: i32::try_from(s.max_unacked_records).unwrap_or(i32::MAX),
            offset: 0,
        };
        wire.set_offset(s.offset.into());
        wire
    }
}

/// Options for creating a shard reader.
///
/// When `shard_id` is `None` the shard is chosen from `key` the same way
/// appends choose theirs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub stream_name: String,
    pub reader_id: String,
    pub offset: ShardOffset,
    pub timeout: Duration,
    pub shard_id: Option<u64>,
    pub key: Option<String>,
}

impl ReaderConfig {
    pub fn new(
        stream_name: impl Into<String>,
        reader_id: impl Into<String>,
        offset: ShardOffset,
        timeout: Duration,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            reader_id: reader_id.into(),
            offset,
            timeout,
            shard_id: None,
            key: None,
        }
    }

    pub fn with_shard_id(mut self, shard_id: u64) -> Self {
        self.shard_id = Some(shard_id);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Record body as the application sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Raw(Vec<u8>),
    Json(serde_json::Value),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Raw(bytes.to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Raw(s.into_bytes())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Raw(s.as_bytes().to_vec())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// A payload paired with its own key, as queued by a batching producer.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendPayload {
    pub key: Option<String>,
    pub payload: Payload,
}

impl AppendPayload {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            key: None,
            payload: payload.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A record read back from a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub key: String,
    pub payload: Payload,
}

pub(crate) fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
