//! Per-request cancellation and per-call deadlines.

use crate::services::store::{StoreError, StoreResult};
use std::{future::Future, time::Duration};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;
use uuid::Uuid;

/// Carried explicitly into every outbound storage call of one request.
///
/// Dropping the guard returned by [`RequestContext::cancel_on_drop`] cancels
/// the token, so a handler future dropped on client disconnect stops any
/// call still waiting.
#[derive(Clone, Debug)]
pub struct RequestContext {
    id: Uuid,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_on_drop(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    /// Run one storage call under its own deadline.
    ///
    /// Timeouts and cancellation come back as ordinary [`StoreError`]s so
    /// callers handle them like any other failure.
    pub async fn call<T, F>(&self, op: &str, limit: Duration, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled(op.to_string())),
            res = tokio::time::timeout(limit, fut) => match res {
                Ok(inner) => inner,
                Err(_) => {
                    warn!(request_id = %self.id, "[timeout] {} after {:?}", op, limit);
                    Err(StoreError::Timeout {
                        op: op.to_string(),
                        after: limit,
                    })
                }
            },
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
