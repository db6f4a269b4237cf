//! Integration tests for control-plane failover.

use hstream_client::{ClientError, NodeTarget, Stream};
use test_log::test;

use crate::test_utilities::MockCluster;

/// The target a switch away from node 0 is expected to land on.
fn first_other(cluster: &MockCluster) -> (usize, NodeTarget) {
    (1..cluster.nodes.len())
        .map(|index| (index, cluster.target(index)))
        .min_by(|a, b| a.1.cmp(&b.1))
        .unwrap()
}

#[test(tokio::test)]
async fn test_control_call_fails_over_once() {
    let cluster = MockCluster::start(3).await;
    let client = cluster.client(0).await;
    let (next, next_target) = first_other(&cluster);

    cluster.node(0).set_down(true);
    client.create_stream(&Stream::new("orders")).await.unwrap();

    assert_eq!(client.control_target(), next_target);
    assert_eq!(cluster.node(0).calls("create_stream"), 1);
    assert_eq!(cluster.node(next).calls("create_stream"), 1);
    // The new control target answered a membership refresh before the retry.
    assert_eq!(cluster.node(next).calls("describe_cluster"), 1);
    assert_eq!(cluster.state.streams.lock().len(), 1);
}

#[test(tokio::test)]
async fn test_switch_never_reselects_the_failed_target() {
    let cluster = MockCluster::start(2).await;
    let client = cluster.client(0).await;

    cluster.node(0).set_down(true);
    client.list_streams().await.unwrap();

    assert_eq!(client.control_target(), cluster.target(1));
    assert_eq!(cluster.node(0).calls("list_streams"), 1);
    assert_eq!(cluster.node(0).calls("describe_cluster"), 1);
}

#[test(tokio::test)]
async fn test_second_unavailable_propagates() {
    let cluster = MockCluster::start(3).await;
    let client = cluster.client(0).await;
    for node in &cluster.nodes {
        node.fail_rpc("list_streams");
    }

    let err = client.list_streams().await.unwrap_err();

    assert!(err.is_unavailable());
    assert_eq!(cluster.calls("list_streams"), 2);
    // Exactly one switch: one refresh beyond the initial connect.
    assert_eq!(cluster.calls("describe_cluster"), 2);
}

#[test(tokio::test)]
async fn test_other_errors_are_not_retried() {
    let cluster = MockCluster::start(2).await;
    let client = cluster.client(0).await;

    let err = client.delete_stream("missing", false, false).await.unwrap_err();

    assert!(matches!(err, ClientError::RpcFailed { .. }));
    assert_eq!(cluster.calls("delete_stream"), 1);
    assert_eq!(client.control_target(), cluster.target(0));
    assert_eq!(cluster.calls("describe_cluster"), 1);
}

#[test(tokio::test)]
async fn test_switch_skips_targets_whose_refresh_fails() {
    let cluster = MockCluster::start(3).await;
    let client = cluster.client(0).await;
    let (next, _) = first_other(&cluster);
    let last = if next == 1 { 2 } else { 1 };

    cluster.node(0).set_down(true);
    cluster.node(next).set_down(true);
    client.list_streams().await.unwrap();

    assert_eq!(client.control_target(), cluster.target(last));
    assert_eq!(cluster.node(next).calls("describe_cluster"), 1);
    assert_eq!(cluster.node(next).calls("list_streams"), 0);
    assert_eq!(cluster.node(last).calls("list_streams"), 1);
}

#[test(tokio::test)]
async fn test_exhausted_targets() {
    let cluster = MockCluster::start(2).await;
    let client = cluster.client(0).await;

    cluster.node(0).set_down(true);
    cluster.node(1).set_down(true);
    let err = client.list_streams().await.unwrap_err();

    assert_eq!(err, ClientError::ExhaustedTargets);
    assert_eq!(cluster.node(1).calls("describe_cluster"), 1);
    assert_eq!(cluster.node(1).calls("list_streams"), 0);
}

#[test(tokio::test)]
async fn test_concurrent_failures_switch_once() {
    let cluster = MockCluster::start(3).await;
    let client = cluster.client(0).await;
    let (next, next_target) = first_other(&cluster);
    let last = if next == 1 { 2 } else { 1 };

    cluster.node(0).set_down(true);
    let (a, b) = tokio::join!(client.list_streams(), client.list_streams());
    a.unwrap();
    b.unwrap();

    // The second failure saw the control plane already moved and evicted nothing more.
    assert_eq!(client.control_target(), next_target);
    assert_eq!(cluster.node(last).total_calls(), 0);
    assert!(client.known_targets().contains(&next_target));
}

#[test(tokio::test)]
async fn test_lookup_fails_over_and_data_plane_follows_route() {
    let cluster = MockCluster::start(3).await;
    cluster.state.add_stream("orders", 2);
    let client = cluster.client(0).await;
    let (next, next_target) = first_other(&cluster);
    cluster.serve_from(next);

    cluster.node(0).set_down(true);
    client.append("orders", ["p1"], Some("k")).await.unwrap();

    assert_eq!(client.control_target(), next_target);
    assert_eq!(cluster.node(0).calls("list_shards"), 1);
    assert_eq!(cluster.node(0).calls("lookup_shard"), 0);
    assert_eq!(cluster.node(next).calls("lookup_shard"), 1);
    assert_eq!(cluster.node(next).calls("append"), 1);
}
