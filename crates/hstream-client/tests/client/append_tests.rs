//! Integration tests for the append path and shard route caching.

use hstream_client::{AppendPayload, ClientError, RecordId};
use hstream_proto as proto;
use serde_json::json;

use crate::test_utilities::MockCluster;

fn total_calls(cluster: &MockCluster) -> usize {
    cluster.nodes.iter().map(|node| node.total_calls()).sum()
}

#[tokio::test]
async fn test_append_routes_to_serving_node_and_caches() {
    let cluster = MockCluster::start(3).await;
    let shards = cluster.state.add_stream("orders", 4);
    cluster.serve_from(1);
    let client = cluster.client(0).await;

    let ids: Vec<RecordId> = client
        .append("orders", ["p1", "p2"], Some("acct-1"))
        .await
        .unwrap()
        .collect();

    let shard_id = shards[0].shard_id;
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.shard_id == shard_id));
    assert_eq!(ids[0].batch_index, 0);
    assert_eq!(ids[1].batch_index, 1);

    // Lookup on the control plane, append on the serving node.
    assert_eq!(cluster.node(0).calls("lookup_shard"), 1);
    assert_eq!(cluster.node(0).calls("append"), 0);
    assert_eq!(cluster.node(1).calls("append"), 1);
    assert!(client.is_connected(&cluster.target(1)));

    client
        .append("orders", ["p3"], Some("acct-1"))
        .await
        .unwrap();
    assert_eq!(cluster.calls("lookup_shard"), 1);
    assert_eq!(cluster.calls("list_shards"), 1);
    assert_eq!(cluster.node(1).calls("append"), 2);
}

#[tokio::test]
async fn test_append_wire_records_keep_order_and_key() {
    let cluster = MockCluster::start(1).await;
    cluster.state.add_stream("orders", 1);
    let client = cluster.client(0).await;

    client
        .append("orders", ["first", "second", "third"], Some("acct-9"))
        .await
        .unwrap();

    let appends = cluster.node(0).appends.lock().clone();
    assert_eq!(appends.len(), 1);
    let payloads: Vec<&[u8]> = appends[0]
        .records
        .iter()
        .map(|r| r.payload.as_slice())
        .collect();
    assert_eq!(
        payloads,
        vec![b"first".as_slice(), b"second".as_slice(), b"third".as_slice()]
    );

    let header = appends[0].records[0].header.clone().unwrap();
    assert_eq!(header.key, "acct-9");
    assert_eq!(header.flag(), proto::RecordFlag::Raw);
}

#[tokio::test]
async fn test_append_json_payload_sets_flag() {
    let cluster = MockCluster::start(1).await;
    cluster.state.add_stream("events", 1);
    let client = cluster.client(0).await;

    client
        .append("events", [json!({"kind": "created", "id": 7})], None)
        .await
        .unwrap();

    let appends = cluster.node(0).appends.lock().clone();
    let record = &appends[0].records[0];
    assert_eq!(record.header.clone().unwrap().flag(), proto::RecordFlag::Json);
    let decoded: serde_json::Value = serde_json::from_slice(&record.payload).unwrap();
    assert_eq!(decoded, json!({"kind": "created", "id": 7}));
}

#[tokio::test]
async fn test_append_with_shard_empty_batch_makes_no_calls() {
    let cluster = MockCluster::start(2).await;
    let client = cluster.client(0).await;
    let before = total_calls(&cluster);

    let ids = client.append_with_shard("orders", Vec::new(), 3).await.unwrap();

    assert_eq!(ids.count(), 0);
    assert_eq!(total_calls(&cluster), before);
}

#[tokio::test]
async fn test_append_with_shard_keeps_per_payload_keys() {
    let cluster = MockCluster::start(1).await;
    let client = cluster.client(0).await;

    let ids: Vec<RecordId> = client
        .append_with_shard(
            "orders",
            vec![
                AppendPayload::new("a").with_key("k1"),
                AppendPayload::new("b"),
                AppendPayload::new("c").with_key("k2"),
            ],
            42,
        )
        .await
        .unwrap()
        .collect();

    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.shard_id == 42));
    // No shard list needed when the shard is given.
    assert_eq!(cluster.calls("list_shards"), 0);

    let appends = cluster.node(0).appends.lock().clone();
    let keys: Vec<String> = appends[0]
        .records
        .iter()
        .map(|r| r.header.clone().unwrap().key)
        .collect();
    assert_eq!(keys, vec!["k1", "", "k2"]);
}

#[tokio::test]
async fn test_append_lookup_mismatch_is_consistency_violation() {
    let cluster = MockCluster::start(1).await;
    cluster.state.add_stream("orders", 1);
    let client = cluster.client(0).await;

    *cluster.state.lookup_id_override.lock() = Some("999".to_string());
    let err = client.append("orders", ["x"], None).await.unwrap_err();
    assert!(matches!(err, ClientError::ConsistencyViolation { .. }));
    assert_eq!(cluster.calls("append"), 0);

    // The bad answer was not cached.
    *cluster.state.lookup_id_override.lock() = None;
    client.append("orders", ["x"], None).await.unwrap();
    assert_eq!(cluster.calls("lookup_shard"), 2);
}

#[tokio::test]
async fn test_cached_shard_route_is_not_failed_over() {
    let cluster = MockCluster::start(3).await;
    cluster.state.add_stream("orders", 4);
    cluster.serve_from(1);
    let client = cluster.client(0).await;

    client
        .append("orders", ["p1", "p2"], Some("acct-1"))
        .await
        .unwrap();

    cluster.node(1).set_down(true);
    let err = client
        .append("orders", ["p3"], Some("acct-1"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());

    // The data-plane failure neither moved the control plane nor re-resolved.
    assert_eq!(client.control_target(), cluster.target(0));
    assert_eq!(cluster.calls("describe_cluster"), 1);
    assert_eq!(cluster.calls("lookup_shard"), 1);

    // Still routed to the cached node, so it keeps failing until it recovers.
    let err = client
        .append("orders", ["p4"], Some("acct-1"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(cluster.node(1).calls("append"), 3);

    cluster.node(1).set_down(false);
    client
        .append("orders", ["p5"], Some("acct-1"))
        .await
        .unwrap();
    assert_eq!(cluster.calls("lookup_shard"), 1);
}
