//! Routing cache: which target serves a shard, subscription or reader.
//!
//! Entries are filled by lookup calls and overwritten by later lookups for the
//! same key. Nothing expires, and a target becoming unreachable does not
//! invalidate the entries that point at it.

use dashmap::DashMap;
use std::hash::Hash;

use crate::types::{NodeTarget, Shard};

/// One key -> target map.
#[derive(Debug)]
pub struct RouteTable<K: Eq + Hash> {
    routes: DashMap<K, NodeTarget>,
}

impl<K: Eq + Hash> Default for RouteTable<K> {
    fn default() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash> RouteTable<K> {
    pub fn get(&self, key: &K) -> Option<NodeTarget> {
        self.routes.get(key).map(|entry| entry.value().clone())
    }

    /// Last write wins.
    pub fn insert(&self, key: K, target: NodeTarget) {
        self.routes.insert(key, target);
    }
}

/// Key of the append route map: stream name and shard id.
pub type ShardKey = (String, u64);

#[derive(Debug, Default)]
pub struct RoutingCache {
    pub shards: RouteTable<ShardKey>,
    pub subscriptions: RouteTable<String>,
    pub readers: RouteTable<String>,
}

/// Shard lists per stream, kept for the life of the client unless forgotten.
#[derive(Debug, Default)]
pub struct ShardListCache {
    lists: DashMap<String, Vec<Shard>>,
}

impl ShardListCache {
    /// Cached non-empty list for `stream`.
    pub fn get(&self, stream: &str) -> Option<Vec<Shard>> {
        self.lists
            .get(stream)
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, stream: &str, shards: Vec<Shard>) {
        self.lists.insert(stream.to_string(), shards);
    }

    pub fn forget(&self, stream: &str) -> bool {
        self.lists.remove(stream).is_some()
    }
}
