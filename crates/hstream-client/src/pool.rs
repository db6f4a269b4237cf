//! Per-target channel registry.
//!
//! The pool's key set is the cluster membership set: a target may be known
//! without a channel yet, and a channel is only built on first use.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

use crate::ClientError;
use crate::config::TlsMaterial;
use crate::types::NodeTarget;

/// Registry entry for one known target.
#[derive(Debug, Clone)]
pub enum TargetState {
    Unconnected,
    Connected(Arc<Channel>),
}

#[derive(Debug)]
pub struct ChannelPool {
    targets: Mutex<BTreeMap<NodeTarget, TargetState>>,
    tls: Option<TlsMaterial>,
    closed: AtomicBool,
}

impl ChannelPool {
    pub fn new(tls: Option<TlsMaterial>) -> Self {
        Self {
            targets: Mutex::new(BTreeMap::new()),
            tls,
            closed: AtomicBool::new(false),
        }
    }

    fn build_channel(&self, target: &NodeTarget) -> Result<Channel, ClientError> {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{target}"))
            .map_err(|e| ClientError::from_parse_error(e, &format!("endpoint for {target}")))?;

        if let Some(tls) = &self.tls {
            endpoint = endpoint
                .tls_config(tls.to_tls_config(&target.host))
                .map_err(|e| ClientError::from_parse_error(e, &format!("TLS for {target}")))?;
        }

        // Lazy: no I/O until the first call, so building never blocks.
        Ok(endpoint.connect_lazy())
    }

    /// Return the channel for `target`, creating and registering it on first use.
    ///
    /// Fails with [`ClientError::Shutdown`] once the pool has been shut down.
    pub fn get_or_create(&self, target: &NodeTarget) -> Result<Arc<Channel>, ClientError> {
        let mut targets = self.targets.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Shutdown);
        }
        if let Some(TargetState::Connected(channel)) = targets.get(target) {
            return Ok(Arc::clone(channel));
        }

        let channel = Arc::new(self.build_channel(target)?);
        targets.insert(target.clone(), TargetState::Connected(Arc::clone(&channel)));
        debug!(node = %target, "created channel");
        Ok(channel)
    }

    /// Register unseen targets without connecting. Known targets are untouched.
    pub fn merge<I>(&self, discovered: I) -> usize
    where
        I: IntoIterator<Item = NodeTarget>,
    {
        let mut targets = self.targets.lock();
        let mut added = 0;
        for target in discovered {
            if !targets.contains_key(&target) {
                debug!(node = %target, "discovered target");
                targets.insert(target, TargetState::Unconnected);
                added += 1;
            }
        }
        added
    }

    /// Forget `target` and return the first remaining one, if any.
    pub fn evict_and_pick(&self, target: &NodeTarget) -> Option<NodeTarget> {
        let mut targets = self.targets.lock();
        targets.remove(target);
        targets.keys().next().cloned()
    }

    pub fn contains(&self, target: &NodeTarget) -> bool {
        self.targets.lock().contains_key(target)
    }

    pub fn is_connected(&self, target: &NodeTarget) -> bool {
        matches!(
            self.targets.lock().get(target),
            Some(TargetState::Connected(_))
        )
    }

    pub fn targets(&self) -> Vec<NodeTarget> {
        self.targets.lock().keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.lock().len()
    }

    /// Drop every channel immediately and refuse to build new ones. Targets stay known.
    pub fn shutdown(&self) {
        let mut targets = self.targets.lock();
        self.closed.store(true, Ordering::Release);
        let mut closed = 0;
        for state in targets.values_mut() {
            if let TargetState::Connected(_) = std::mem::replace(state, TargetState::Unconnected) {
                closed += 1;
            }
        }
        info!(closed, "closed all channels");
    }
}
