//! Single-retry failover combinator.

use std::future::Future;
use tracing::warn;

use crate::ClientError;

/// Run `op`; if it reports the target unavailable, run `switch` once and then
/// `op` exactly one more time, returning that second outcome as-is.
///
/// Any other error, and a second unavailability, propagate untouched.
pub async fn retry_after_failover<T, Op, OpFut, Switch, SwitchFut>(
    mut op: Op,
    switch: Switch,
) -> Result<T, ClientError>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, ClientError>>,
    Switch: FnOnce() -> SwitchFut,
    SwitchFut: Future<Output = Result<(), ClientError>>,
{
    match op().await {
        Err(err) if err.is_unavailable() => {
            warn!(error = %err, "call hit an unavailable target, failing over");
            switch().await?;
            op().await
        }
        outcome => outcome,
    }
}
