//! The client session: channel pool, membership, control plane and routing.
//!
//! Every control-plane call goes through [`HStreamClient::with_failover`].
//! Data-plane calls run on a stub bound to whichever target the routing cache
//! names for their shard, subscription or reader, and are not retried.

use hstream_proto::{self as proto, HStreamApiClient};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tonic::Status;
use tonic::transport::Channel;
use tracing::{debug, info, warn};

use crate::ClientError;
use crate::config::ClientConfig;
use crate::failover::retry_after_failover;
use crate::pool::ChannelPool;
use crate::routing::{RoutingCache, ShardListCache};
use crate::types::NodeTarget;

/// Generated gRPC stub over a pooled channel.
pub type ApiStub = HStreamApiClient<Channel>;

/// Map a failed RPC into a [`ClientError`] tagged with `context`.
pub(crate) fn rpc_error(context: &'static str) -> impl Fn(Status) -> ClientError {
    move |status| ClientError::from_status(status, context)
}

/// The control-plane binding. `stub` is cleared at shutdown; `target` is kept.
#[derive(Debug, Clone)]
struct ControlPlane {
    target: NodeTarget,
    stub: Option<ApiStub>,
}

impl ControlPlane {
    fn new(target: NodeTarget, channel: &Channel) -> Self {
        Self {
            target,
            stub: Some(HStreamApiClient::new(channel.clone())),
        }
    }
}

#[derive(Debug)]
struct ClientInner {
    pool: ChannelPool,
    control: RwLock<ControlPlane>,
    routes: RoutingCache,
    shard_lists: ShardListCache,
}

/// Handle to one client session. Clones share the same session state.
#[derive(Debug, Clone)]
pub struct HStreamClient {
    inner: Arc<ClientInner>,
}

impl HStreamClient {
    /// Bind to the seed target and discover the rest of the cluster.
    ///
    /// The initial membership refresh is not retried: an unreachable seed fails
    /// construction.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        if let Some(tls) = &config.tls {
            tls.validate()?;
        }

        let pool = ChannelPool::new(config.tls.clone());
        let channel = pool.get_or_create(&config.seed)?;
        let control = ControlPlane::new(config.seed.clone(), &channel);

        let client = Self {
            inner: Arc::new(ClientInner {
                pool,
                control: RwLock::new(control),
                routes: RoutingCache::default(),
                shard_lists: ShardListCache::default(),
            }),
        };
        client.refresh_membership().await?;

        info!(
            seed = %config.seed,
            known_targets = client.inner.pool.len(),
            secure = config.is_secure(),
            "connected to cluster"
        );
        Ok(client)
    }

    /// Target the control plane is currently bound to.
    pub fn control_target(&self) -> NodeTarget {
        self.inner.control.read().target.clone()
    }

    /// Every target known to the session, connected or not.
    pub fn known_targets(&self) -> Vec<NodeTarget> {
        self.inner.pool.targets()
    }

    pub fn is_connected(&self, target: &NodeTarget) -> bool {
        self.inner.pool.is_connected(target)
    }

    /// Close every channel without a grace period.
    ///
    /// Later calls fail with [`ClientError::Shutdown`] instead of reconnecting.
    pub fn shutdown(&self) {
        self.inner.control.write().stub = None;
        self.inner.pool.shutdown();
    }

    pub(crate) fn control_stub(&self) -> Result<ApiStub, ClientError> {
        self.inner
            .control
            .read()
            .stub
            .clone()
            .ok_or(ClientError::Shutdown)
    }

    /// Fresh stub bound to `target`'s pooled channel.
    pub(crate) fn data_stub(&self, target: &NodeTarget) -> Result<ApiStub, ClientError> {
        let channel = self.inner.pool.get_or_create(target)?;
        Ok(HStreamApiClient::new(Channel::clone(&channel)))
    }

    pub(crate) fn routes(&self) -> &RoutingCache {
        &self.inner.routes
    }

    pub(crate) fn shard_lists(&self) -> &ShardListCache {
        &self.inner.shard_lists
    }

    /// Merge the cluster's current nodes into the known target set.
    async fn refresh_membership(&self) -> Result<(), ClientError> {
        let mut stub = self.control_stub()?;
        let cluster = stub
            .describe_cluster(())
            .await
            .map_err(rpc_error("describe cluster"))?
            .into_inner();

        let nodes = cluster
            .server_nodes
            .into_iter()
            .map(NodeTarget::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let added = self.inner.pool.merge(nodes);

        debug!(
            added,
            known_targets = self.inner.pool.len(),
            server_version = %cluster.server_version,
            "refreshed cluster membership"
        );
        Ok(())
    }

    /// Run a control-plane call, failing over once if its target is unavailable.
    pub(crate) async fn with_failover<T, Op, Fut>(&self, op: Op) -> Result<T, ClientError>
    where
        Op: Fn(ApiStub) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let bound_to = self.control_target();
        let op = &op;
        retry_after_failover(
            move || async move { op(self.control_stub()?).await },
            || self.switch_channel(bound_to),
        )
        .await
    }

    /// Abandon `failed` and rebind the control plane to another known target.
    ///
    /// Loops through the remaining targets until one answers a membership
    /// refresh. If the control plane already moved off `failed`, another task
    /// did the switch and nothing is evicted.
    async fn switch_channel(&self, failed: NodeTarget) -> Result<(), ClientError> {
        let mut failed = failed;
        loop {
            if self.control_target() != failed {
                debug!(node = %failed, "control plane already switched");
                return Ok(());
            }

            warn!(node = %failed, "target unavailable, switching to another");
            let next = self
                .inner
                .pool
                .evict_and_pick(&failed)
                .ok_or(ClientError::ExhaustedTargets)?;

            let channel = self.inner.pool.get_or_create(&next)?;
            *self.inner.control.write() = ControlPlane::new(next.clone(), &channel);

            match self.refresh_membership().await {
                Ok(()) => {
                    info!(node = %next, "control plane switched");
                    return Ok(());
                }
                Err(err) if err.is_rpc_error() => {
                    warn!(node = %next, error = %err, "fetching cluster info failed");
                    failed = next;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Target serving `(stream, shard_id)`, looked up on a cache miss.
    pub(crate) async fn resolve_shard_target(
        &self,
        stream: &str,
        shard_id: u64,
    ) -> Result<NodeTarget, ClientError> {
        let key = (stream.to_string(), shard_id);
        if let Some(target) = self.routes().shards.get(&key) {
            debug!(stream, shard_id, node = %target, "shard route cached");
            return Ok(target);
        }

        let response = self
            .with_failover(|mut stub| async move {
                stub.lookup_shard(proto::LookupShardRequest { shard_id })
                    .await
                    .map_err(rpc_error("lookup shard"))
                    .map(tonic::Response::into_inner)
            })
            .await?;

        if response.shard_id != shard_id {
            return Err(ClientError::ConsistencyViolation {
                context: "lookup shard".to_string(),
                expected: shard_id.to_string(),
                actual: response.shard_id.to_string(),
            });
        }
        let target = node_of(response.server_node, "lookup shard")?;

        self.routes().shards.insert(key, target.clone());
        debug!(stream, shard_id, node = %target, "resolved shard route");
        Ok(target)
    }

    pub(crate) async fn resolve_subscription_target(
        &self,
        subscription_id: &str,
    ) -> Result<NodeTarget, ClientError> {
        let key = subscription_id.to_string();
        if let Some(target) = self.routes().subscriptions.get(&key) {
            debug!(subscription_id, node = %target, "subscription route cached");
            return Ok(target);
        }

        let request = proto::LookupSubscriptionRequest {
            subscription_id: key.clone(),
        };
        let response = self
            .with_failover(|mut stub| {
                let request = request.clone();
                async move {
                    stub.lookup_subscription(request)
                        .await
                        .map_err(rpc_error("lookup subscription"))
                        .map(tonic::Response::into_inner)
                }
            })
            .await?;

        if response.subscription_id != subscription_id {
            return Err(ClientError::ConsistencyViolation {
                context: "lookup subscription".to_string(),
                expected: key,
                actual: response.subscription_id,
            });
        }
        let target = node_of(response.server_node, "lookup subscription")?;

        self.routes().subscriptions.insert(key, target.clone());
        debug!(subscription_id, node = %target, "resolved subscription route");
        Ok(target)
    }

    pub(crate) async fn resolve_reader_target(
        &self,
        reader_id: &str,
    ) -> Result<NodeTarget, ClientError> {
        let key = reader_id.to_string();
        if let Some(target) = self.routes().readers.get(&key) {
            debug!(reader_id, node = %target, "reader route cached");
            return Ok(target);
        }

        let request = proto::LookupShardReaderRequest {
            reader_id: key.clone(),
        };
        let response = self
            .with_failover(|mut stub| {
                let request = request.clone();
                async move {
                    stub.lookup_shard_reader(request)
                        .await
                        .map_err(rpc_error("lookup shard reader"))
                        .map(tonic::Response::into_inner)
                }
            })
            .await?;

        if response.reader_id != reader_id {
            return Err(ClientError::ConsistencyViolation {
                context: "lookup shard reader".to_string(),
                expected: key,
                actual: response.reader_id,
            });
        }
        let target = node_of(response.server_node, "lookup shard reader")?;

        self.routes().readers.insert(key, target.clone());
        debug!(reader_id, node = %target, "resolved reader route");
        Ok(target)
    }
}

fn node_of(node: Option<proto::ServerNode>, context: &str) -> Result<NodeTarget, ClientError> {
    node.ok_or_else(|| ClientError::missing_field("server_node", context))
        .and_then(NodeTarget::try_from)
}
