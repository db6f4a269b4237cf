//! Subscription management and consumer construction.

use futures_util::FutureExt;
use hstream_proto as proto;
use std::sync::Arc;
use tracing::debug;

use crate::ClientError;
use crate::client::{HStreamClient, rpc_error};
use crate::consumer::{Consumer, RecordHandler, StubFactory};
use crate::types::Subscription;

impl HStreamClient {
    pub async fn create_subscription(&self, subscription: &Subscription) -> Result<(), ClientError> {
        let request = proto::Subscription::from(subscription);
        self.with_failover(|mut stub| {
            let request = request.clone();
            async move {
                stub.create_subscription(request)
                    .await
                    .map_err(rpc_error("create subscription"))?;
                Ok(())
            }
        })
        .await?;

        debug!(
            subscription_id = %subscription.subscription_id,
            stream = %subscription.stream_name,
            "created subscription"
        );
        Ok(())
    }

    pub async fn list_subscriptions(&self) -> Result<std::vec::IntoIter<Subscription>, ClientError> {
        let response = self
            .with_failover(|mut stub| async move {
                stub.list_subscriptions(proto::ListSubscriptionsRequest {})
                    .await
                    .map_err(rpc_error("list subscriptions"))
                    .map(tonic::Response::into_inner)
            })
            .await?;

        let subscriptions: Vec<Subscription> = response
            .subscription
            .into_iter()
            .map(Subscription::from)
            .collect();
        Ok(subscriptions.into_iter())
    }

    pub async fn subscription_exists(&self, subscription_id: &str) -> Result<bool, ClientError> {
        let request = proto::CheckSubscriptionExistRequest {
            subscription_id: subscription_id.to_string(),
        };
        let response = self
            .with_failover(|mut stub| {
                let request = request.clone();
                async move {
                    stub.check_subscription_exist(request)
                        .await
                        .map_err(rpc_error("check subscription"))
                        .map(tonic::Response::into_inner)
                }
            })
            .await?;
        Ok(response.exists)
    }

    /// Delete on the node serving the subscription rather than the control plane.
    pub async fn delete_subscription(
        &self,
        subscription_id: &str,
        force: bool,
    ) -> Result<(), ClientError> {
        let target = self.resolve_subscription_target(subscription_id).await?;
        let mut stub = self.data_stub(&target)?;
        stub.delete_subscription(proto::DeleteSubscriptionRequest {
            subscription_id: subscription_id.to_string(),
            force,
        })
        .await
        .map_err(rpc_error("delete subscription"))?;

        debug!(subscription_id, node = %target, "deleted subscription");
        Ok(())
    }

    /// Build a consumer whose stub factory re-resolves the subscription on every call.
    pub fn new_consumer<H>(
        &self,
        name: impl Into<String>,
        subscription_id: impl Into<String>,
        handler: H,
    ) -> Consumer
    where
        H: RecordHandler + 'static,
    {
        let subscription_id = subscription_id.into();
        let client = self.clone();
        let id = subscription_id.clone();

        let stub_factory: StubFactory = Arc::new(move || {
            let client = client.clone();
            let id = id.clone();
            async move {
                let target = client.resolve_subscription_target(&id).await?;
                client.data_stub(&target)
            }
            .boxed()
        });

        Consumer::new(name, subscription_id, stub_factory, Arc::new(handler))
    }
}
