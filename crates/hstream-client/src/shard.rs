//! Key to shard mapping.
//!
//! Keys hash onto a 128-bit space with MD5; each shard owns an inclusive
//! `[start, end]` slice of that space, reported by the server as decimal
//! strings.

use crate::ClientError;
use crate::types::Shard;

pub fn key_hash(key: &str) -> u128 {
    u128::from_be_bytes(md5::compute(key.as_bytes()).0)
}

fn parse_bound(shard: &Shard, bound: &str) -> Result<u128, ClientError> {
    bound
        .parse::<u128>()
        .map_err(|e| ClientError::MalformedResponse {
            context: format!("shard {} of stream '{}'", shard.shard_id, shard.stream_name),
            reason: format!("hash range key '{bound}': {e}"),
        })
}

/// Pick the shard whose hash range covers `key`. A missing key hashes as "".
pub fn select_shard(shards: &[Shard], key: Option<&str>) -> Result<u64, ClientError> {
    let key = key.unwrap_or_default();
    let hash = key_hash(key);

    for shard in shards {
        let start = parse_bound(shard, &shard.start_hash_range_key)?;
        let end = parse_bound(shard, &shard.end_hash_range_key)?;
        if (start..=end).contains(&hash) {
            return Ok(shard.shard_id);
        }
    }

    Err(ClientError::NoMatchingShard {
        stream: shards
            .first()
            .map(|s| s.stream_name.clone())
            .unwrap_or_default(),
        key: key.to_string(),
    })
}
