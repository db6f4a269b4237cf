//! Consumer-side handle built by [`crate::HStreamClient::new_consumer`].
//!
//! The consumer never keeps a stub: each call to [`Consumer::stub`] goes back
//! through the stub factory, which resolves the subscription's current
//! serving target through the routing cache.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

use crate::ClientError;
use crate::client::ApiStub;
use crate::types::Record;

/// Builds a stub bound to the node serving a subscription.
pub type StubFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<ApiStub, ClientError>> + Send + Sync>;

/// Application callback receiving batches delivered to a consumer.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn handle(&self, subscription_id: &str, records: Vec<Record>) -> Result<(), ClientError>;
}

#[async_trait]
impl<F> RecordHandler for F
where
    F: Fn(&str, Vec<Record>) -> Result<(), ClientError> + Send + Sync,
{
    async fn handle(&self, subscription_id: &str, records: Vec<Record>) -> Result<(), ClientError> {
        self(subscription_id, records)
    }
}

pub struct Consumer {
    name: String,
    subscription_id: String,
    stub_factory: StubFactory,
    handler: Arc<dyn RecordHandler>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("name", &self.name)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl Consumer {
    pub fn new(
        name: impl Into<String>,
        subscription_id: impl Into<String>,
        stub_factory: StubFactory,
        handler: Arc<dyn RecordHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            subscription_id: subscription_id.into(),
            stub_factory,
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// A fresh stub for the subscription's current serving node.
    pub async fn stub(&self) -> Result<ApiStub, ClientError> {
        (self.stub_factory)().await
    }

    /// Hand one delivered batch to the application handler.
    pub async fn dispatch(&self, records: Vec<Record>) -> Result<(), ClientError> {
        debug!(
            consumer = %self.name,
            subscription_id = %self.subscription_id,
            records = records.len(),
            "dispatching records"
        );
        self.handler.handle(&self.subscription_id, records).await
    }
}
