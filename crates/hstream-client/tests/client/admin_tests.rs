//! Integration tests for membership discovery and stream administration.

use hstream_client::{ClientConfig, ClientError, HStreamClient, Stream};
use std::time::Duration;

use crate::test_utilities::{MockCluster, unused_port};

#[tokio::test]
async fn test_connect_discovers_membership() {
    let cluster = MockCluster::start(3).await;
    let client = cluster.client(0).await;

    let mut expected = vec![cluster.target(0), cluster.target(1), cluster.target(2)];
    expected.sort();
    assert_eq!(client.known_targets(), expected);
    assert_eq!(client.control_target(), cluster.target(0));

    // Only the seed has a channel until something routes to the others.
    assert!(client.is_connected(&cluster.target(0)));
    assert!(!client.is_connected(&cluster.target(1)));
    assert_eq!(cluster.node(0).calls("describe_cluster"), 1);
    assert_eq!(cluster.node(1).total_calls(), 0);
}

#[tokio::test]
async fn test_connect_to_unreachable_seed_fails() {
    let port = unused_port().await;
    let result = HStreamClient::connect(ClientConfig::new("127.0.0.1", port)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connect_with_down_seed_is_not_retried() {
    let cluster = MockCluster::start(2).await;
    cluster.node(0).set_down(true);

    let result = HStreamClient::connect(ClientConfig::from_url(&cluster.url(0)).unwrap()).await;

    assert!(matches!(
        result,
        Err(ClientError::TransportUnavailable { .. })
    ));
    assert_eq!(cluster.node(0).calls("describe_cluster"), 1);
    assert_eq!(cluster.node(1).total_calls(), 0);
}

#[tokio::test]
async fn test_create_list_delete_stream() {
    let cluster = MockCluster::start(1).await;
    let client = cluster.client(0).await;

    let stream = Stream::new("orders")
        .with_replication_factor(3)
        .with_backlog_duration(Duration::from_secs(3600))
        .with_shard_count(4);
    client.create_stream(&stream).await.unwrap();

    let streams: Vec<Stream> = client.list_streams().await.unwrap().collect();
    assert_eq!(streams, vec![stream]);

    client.delete_stream("orders", false, false).await.unwrap();
    assert_eq!(client.list_streams().await.unwrap().count(), 0);
}

#[tokio::test]
async fn test_create_stream_defaults_reach_the_wire() {
    let cluster = MockCluster::start(1).await;
    let client = cluster.client(0).await;

    client.create_stream(&Stream::new("defaults")).await.unwrap();

    let wire = cluster.state.streams.lock()[0].clone();
    assert_eq!(wire.replication_factor, 1);
    assert_eq!(wire.backlog_duration, 0);
    assert_eq!(wire.shard_count, 1);
}

#[tokio::test]
async fn test_delete_missing_stream() {
    let cluster = MockCluster::start(1).await;
    let client = cluster.client(0).await;

    client.delete_stream("missing", true, false).await.unwrap();

    let err = client.delete_stream("missing", false, false).await.unwrap_err();
    match err {
        ClientError::RpcFailed { code, .. } => assert_eq!(code, tonic::Code::NotFound),
        other => panic!("Unexpected error type: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_shards_fetches_once() {
    let cluster = MockCluster::start(2).await;
    cluster.state.add_stream("orders", 4);
    let client = cluster.client(0).await;

    let first = client.list_shards("orders").await.unwrap();
    for _ in 0..5 {
        assert_eq!(client.list_shards("orders").await.unwrap(), first);
    }

    assert_eq!(first.len(), 4);
    assert_eq!(cluster.calls("list_shards"), 1);
}

#[tokio::test]
async fn test_list_shards_empty_result_is_not_cached() {
    let cluster = MockCluster::start(1).await;
    let client = cluster.client(0).await;

    assert!(client.list_shards("late").await.unwrap().is_empty());
    cluster.state.add_stream("late", 2);
    assert_eq!(client.list_shards("late").await.unwrap().len(), 2);

    assert_eq!(cluster.calls("list_shards"), 2);
}

#[tokio::test]
async fn test_forget_shards_forces_refetch() {
    let cluster = MockCluster::start(1).await;
    cluster.state.add_stream("orders", 1);
    let client = cluster.client(0).await;

    client.list_shards("orders").await.unwrap();
    assert!(client.forget_shards("orders"));
    assert!(!client.forget_shards("orders"));
    client.list_shards("orders").await.unwrap();

    assert_eq!(cluster.calls("list_shards"), 2);
}

#[tokio::test]
async fn test_select_shard_for_follows_key_hash() {
    let cluster = MockCluster::start(1).await;
    let shards = cluster.state.add_stream("orders", 4);
    let client = cluster.client(0).await;

    // md5("") = d41d8cd9..., in the last quarter of the hash space.
    let unkeyed = client.select_shard_for("orders", None).await.unwrap();
    assert_eq!(unkeyed, shards[3].shard_id);

    // md5("acct-1") = 14d2b15c..., in the first quarter.
    let keyed = client.select_shard_for("orders", Some("acct-1")).await.unwrap();
    assert_eq!(keyed, shards[0].shard_id);
    assert_eq!(
        client.select_shard_for("orders", Some("acct-1")).await.unwrap(),
        keyed
    );
}

#[tokio::test]
async fn test_select_shard_for_unknown_stream() {
    let cluster = MockCluster::start(1).await;
    let client = cluster.client(0).await;

    let err = client.select_shard_for("nowhere", Some("k")).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::NoMatchingShard {
            stream: "nowhere".to_string(),
            key: "k".to_string(),
        }
    );
}

#[tokio::test]
async fn test_shutdown_closes_channels() {
    let cluster = MockCluster::start(2).await;
    cluster.state.add_stream("orders", 1);
    cluster.serve_from(1);
    let client = cluster.client(0).await;
    client.append("orders", ["p1"], None).await.unwrap();
    assert!(client.is_connected(&cluster.target(0)));
    assert!(client.is_connected(&cluster.target(1)));

    client.shutdown();

    assert!(!client.is_connected(&cluster.target(0)));
    assert!(!client.is_connected(&cluster.target(1)));
    assert_eq!(client.known_targets().len(), 2);

    // Neither the control plane nor a cached data route reaches a node again.
    let before = cluster.calls("list_streams") + cluster.calls("append");
    assert_eq!(client.list_streams().await.unwrap_err(), ClientError::Shutdown);
    assert_eq!(
        client.append("orders", ["p2"], None).await.unwrap_err(),
        ClientError::Shutdown
    );
    assert_eq!(cluster.calls("list_streams") + cluster.calls("append"), before);
    assert!(!client.is_connected(&cluster.target(1)));
    assert_eq!(client.control_target(), cluster.target(0));
}
