//! The storage seam: what the pairing pipeline needs from an object store.

use crate::models::object::{ObjectBody, ObjectDescriptor, ObjectPage};
use async_trait::async_trait;
use bytes::Bytes;
use std::{io, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("{op} timed out after {after:?}")]
    Timeout { op: String, after: Duration },
    #[error("{0} cancelled")]
    Cancelled(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal S3-like surface used by the listing and file endpoints.
///
/// Implementations do not apply deadlines themselves; callers wrap every
/// call with [`RequestContext::call`](crate::services::context::RequestContext::call).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects under `prefix`, in key order.
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> StoreResult<ObjectPage>;

    /// Download an object's full content.
    async fn get_content(&self, key: &str) -> StoreResult<Bytes>;

    /// Metadata-only probe: size and last-modified, no content transfer.
    async fn head(&self, key: &str) -> StoreResult<ObjectDescriptor>;

    /// Open an object for streaming.
    async fn open(&self, key: &str) -> StoreResult<ObjectBody>;
}
