//! Integration tests for secure channels against TLS mock nodes.

use hstream_client::{Stream, TlsMaterial};

use crate::test_utilities::{CA_CERT, MockCluster, NODE_CERT, NODE_KEY};

#[tokio::test]
async fn test_secure_client_with_root_certificate() {
    let cluster = MockCluster::start_secure(2).await;
    cluster.state.add_stream("orders", 1);
    cluster.serve_from(1);

    let tls = TlsMaterial::from_pem(Some(CA_CERT.to_vec()), None, None);
    let client = cluster.secure_client(0, tls).await.unwrap();
    assert_eq!(client.known_targets().len(), 2);

    client.create_stream(&Stream::new("events")).await.unwrap();
    client.append("orders", ["p1"], None).await.unwrap();

    // The data-plane channel to the serving node is secure too.
    assert_eq!(cluster.node(1).calls("append"), 1);
    assert!(client.is_connected(&cluster.target(1)));
}

#[tokio::test]
async fn test_secure_client_presents_identity() {
    let cluster = MockCluster::start_secure(1).await;
    let tls = TlsMaterial::from_pem(
        Some(CA_CERT.to_vec()),
        Some(NODE_KEY.to_vec()),
        Some(NODE_CERT.to_vec()),
    );

    let client = cluster.secure_client(0, tls).await.unwrap();
    assert_eq!(client.list_streams().await.unwrap().count(), 0);
}

#[tokio::test]
async fn test_secure_client_without_root_rejects_untrusted_node() {
    let cluster = MockCluster::start_secure(1).await;

    // The test CA is not in the system trust store.
    let result = cluster.secure_client(0, TlsMaterial::default()).await;

    assert!(result.is_err());
    assert_eq!(cluster.calls("describe_cluster"), 0);
}
