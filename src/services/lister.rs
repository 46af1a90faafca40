//! Bounded scan of the bucket listing for metadata objects.

use crate::{
    models::object::ObjectDescriptor,
    services::{
        context::RequestContext,
        store::{ObjectStore, StoreResult},
    },
};
use std::time::Duration;
use tracing::debug;

pub const METADATA_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub struct ListerLimits {
    /// Keys requested per listing page.
    pub page_size: usize,
    /// Hard ceiling on pages read per request.
    pub max_pages: usize,
    /// Deadline for each listing call.
    pub list_timeout: Duration,
}

impl Default for ListerLimits {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 200,
            list_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Default)]
pub struct MetadataBatch {
    pub objects: Vec<ObjectDescriptor>,
    /// Cursor for the following page, set only when the scan stopped early.
    pub next_continuation_token: Option<String>,
    pub pages_read: usize,
}

pub fn is_metadata_key(key: &str) -> bool {
    key.len() >= METADATA_SUFFIX.len()
        && key.as_bytes()[key.len() - METADATA_SUFFIX.len()..]
            .eq_ignore_ascii_case(METADATA_SUFFIX.as_bytes())
}

/// Collect up to `limit` metadata objects under `prefix`.
///
/// Memory stays proportional to `limit`. Listing failures propagate: a
/// partial batch is never returned.
pub async fn collect_metadata_objects(
    store: &dyn ObjectStore,
    ctx: &RequestContext,
    prefix: &str,
    continuation_token: Option<String>,
    limit: usize,
    limits: &ListerLimits,
) -> StoreResult<MetadataBatch> {
    let mut batch = MetadataBatch::default();
    let mut token = continuation_token;

    while batch.pages_read < limits.max_pages {
        let page = ctx
            .call(
                "ListObjectsV2",
                limits.list_timeout,
                store.list_page(prefix, token.as_deref(), limits.page_size),
            )
            .await?;
        batch.pages_read += 1;

        for obj in page.objects {
            if batch.objects.len() >= limit {
                break;
            }
            if obj.key.is_empty() || !is_metadata_key(&obj.key) {
                continue;
            }
            batch.objects.push(obj);
        }

        debug!(
            request_id = %ctx.id(),
            page = batch.pages_read,
            collected = batch.objects.len(),
            truncated = page.is_truncated,
            "listed page"
        );

        if batch.objects.len() >= limit {
            batch.next_continuation_token = if page.is_truncated {
                page.next_continuation_token
            } else {
                None
            };
            break;
        }

        if !page.is_truncated {
            break;
        }

        match page.next_continuation_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(batch)
}
