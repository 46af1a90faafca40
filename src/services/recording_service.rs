//! RecordingService — pairs call-recording metadata (JSON) with the media
//! files they reference.
//!
//! One listing request runs: bounded scan for metadata objects, then for each
//! metadata object (in fixed-size concurrent chunks) fetch + parse, derive
//! the media key, HEAD it, and assemble a record. Records are returned newest
//! first. Only listing failures abort the request; anything confined to one
//! object degrades that object's record instead.

use crate::{
    models::{
        object::{ObjectBody, ObjectDescriptor},
        recording::{MetadataPayload, PairedRecord},
    },
    services::{
        context::RequestContext,
        key_resolver::KeyResolver,
        lister::{self, ListerLimits},
        store::{ObjectStore, StoreError},
    },
};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_JSON_LIMIT: usize = 25;
pub const MAX_JSON_LIMIT: usize = 200;
pub const DEFAULT_JSON_CONCURRENCY: usize = 3;
pub const MAX_JSON_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("missing tenant identity")]
    MissingTenant,
    #[error("bucket not configured")]
    BucketNotConfigured,
    #[error("key `{0}` is outside the tenant prefix")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type PairingResult<T> = Result<T, PairingError>;

/// Deadlines and listing bounds for the pipeline.
#[derive(Debug, Clone)]
pub struct PairingSettings {
    pub lister: ListerLimits,
    pub fetch_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for PairingSettings {
    fn default() -> Self {
        Self {
            lister: ListerLimits::default(),
            fetch_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(8),
        }
    }
}

/// One listing request, already scoped to a tenant.
#[derive(Debug, Clone)]
pub struct ListRecordingsRequest {
    pub tenant: String,
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub json_limit: Option<i64>,
    pub json_concurrency: Option<i64>,
}

impl ListRecordingsRequest {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            prefix: None,
            continuation_token: None,
            json_limit: None,
            json_concurrency: None,
        }
    }

    /// Listing prefix: `<tenant>/` followed by the caller's sub-prefix.
    pub fn scoped_prefix(&self) -> String {
        format!("{}/{}", self.tenant, self.prefix.as_deref().unwrap_or(""))
    }

    pub fn json_limit(&self) -> usize {
        clamp_param(self.json_limit, DEFAULT_JSON_LIMIT, MAX_JSON_LIMIT)
    }

    pub fn json_concurrency(&self) -> usize {
        clamp_param(
            self.json_concurrency,
            DEFAULT_JSON_CONCURRENCY,
            MAX_JSON_CONCURRENCY,
        )
    }
}

#[derive(Debug)]
pub struct RecordingBatch {
    pub records: Vec<PairedRecord>,
    pub next_continuation_token: Option<String>,
}

/// Shared, immutable for the lifetime of the server.
#[derive(Clone)]
pub struct RecordingService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    resolver: KeyResolver,
    settings: PairingSettings,
}

impl RecordingService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        provider_domains: Vec<String>,
        settings: PairingSettings,
    ) -> Self {
        let bucket = bucket.into();
        Self {
            resolver: KeyResolver::new(bucket.clone(), provider_domains),
            store,
            bucket,
            settings,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn ensure_ready(&self, tenant: &str) -> PairingResult<()> {
        if tenant.trim().is_empty() {
            return Err(PairingError::MissingTenant);
        }
        if self.bucket.is_empty() {
            return Err(PairingError::BucketNotConfigured);
        }
        Ok(())
    }

    /// List a bounded batch of paired records for one tenant.
    pub async fn list_recordings(
        &self,
        ctx: &RequestContext,
        req: &ListRecordingsRequest,
    ) -> PairingResult<RecordingBatch> {
        self.ensure_ready(&req.tenant)?;

        let prefix = req.scoped_prefix();
        let limit = req.json_limit();
        let concurrency = req.json_concurrency();

        let batch = lister::collect_metadata_objects(
            self.store.as_ref(),
            ctx,
            &prefix,
            req.continuation_token.clone(),
            limit,
            &self.settings.lister,
        )
        .await?;

        info!(
            request_id = %ctx.id(),
            prefix = %prefix,
            metadata_objects = batch.objects.len(),
            pages = batch.pages_read,
            concurrency,
            "collected metadata batch"
        );

        let mut records = self.pair_all(ctx, batch.objects, concurrency).await;
        sort_newest_first(&mut records);

        Ok(RecordingBatch {
            records,
            next_continuation_token: batch.next_continuation_token,
        })
    }

    /// Process the batch in consecutive chunks of `concurrency` work units.
    ///
    /// Each chunk runs to completion before the next starts, which bounds
    /// the number of storage calls in flight. Every descriptor owns one slot
    /// of the output.
    async fn pair_all(
        &self,
        ctx: &RequestContext,
        descriptors: Vec<ObjectDescriptor>,
        concurrency: usize,
    ) -> Vec<PairedRecord> {
        let chunk_size = concurrency.max(1);
        let mut slots: Vec<Option<PairedRecord>> = vec![None; descriptors.len()];

        for (chunk_idx, chunk) in descriptors.chunks(chunk_size).enumerate() {
            if ctx.is_cancelled() {
                warn!(request_id = %ctx.id(), "request cancelled, skipping remaining chunks");
                break;
            }
            let base = chunk_idx * chunk_size;
            debug!(
                request_id = %ctx.id(),
                first = base,
                len = chunk.len(),
                "processing chunk"
            );
            let done = join_all(chunk.iter().map(|desc| self.pair_one(ctx, desc))).await;
            for (offset, record) in done.into_iter().enumerate() {
                slots[base + offset] = Some(record);
            }
        }

        slots
            .into_iter()
            .zip(descriptors)
            .map(|(slot, desc)| slot.unwrap_or_else(|| PairedRecord::degraded(desc)))
            .collect()
    }

    /// One work unit. Never fails: errors become a degraded record.
    async fn pair_one(&self, ctx: &RequestContext, desc: &ObjectDescriptor) -> PairedRecord {
        let payload = match self.fetch_payload(ctx, &desc.key).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(request_id = %ctx.id(), key = %desc.key, "[pair] unusable metadata: {}", err);
                return PairedRecord::degraded(desc.clone());
            }
        };

        let media_key = self.resolver.resolve(&desc.key, &payload.media);
        let probed = match &media_key {
            Some(key) => self.probe(ctx, key).await,
            None => None,
        };

        PairedRecord::assemble(desc.clone(), &payload, media_key, probed)
    }

    async fn fetch_payload(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> Result<MetadataPayload, FetchError> {
        let raw = ctx
            .call(
                &format!("GetObject {}", key),
                self.settings.fetch_timeout,
                self.store.get_content(key),
            )
            .await?;
        if raw.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(MetadataPayload::parse(&raw)?)
    }

    /// Best-effort HEAD; `None` on any failure.
    async fn probe(&self, ctx: &RequestContext, key: &str) -> Option<ObjectDescriptor> {
        match ctx
            .call(
                &format!("HeadObject {}", key),
                self.settings.probe_timeout,
                self.store.head(key),
            )
            .await
        {
            Ok(found) => Some(found),
            Err(err) => {
                warn!(request_id = %ctx.id(), key = %key, "[probe] failed: {}", err);
                None
            }
        }
    }

    /// Open one object for streaming, enforcing the tenant prefix.
    pub async fn open_object(
        &self,
        ctx: &RequestContext,
        tenant: &str,
        key: &str,
    ) -> PairingResult<ObjectBody> {
        self.ensure_ready(tenant)?;
        let tenant_root = format!("{}/", tenant);
        if !key.starts_with(&tenant_root) || key.split('/').any(|seg| seg == "..") {
            return Err(PairingError::Forbidden(key.to_string()));
        }
        let body = ctx
            .call(
                &format!("GetObject {}", key),
                self.settings.fetch_timeout,
                self.store.open(key),
            )
            .await?;
        Ok(body)
    }

    /// Readiness check: one single-key listing of the bucket.
    pub async fn check_store(&self, ctx: &RequestContext) -> PairingResult<()> {
        if self.bucket.is_empty() {
            return Err(PairingError::BucketNotConfigured);
        }
        ctx.call(
            "ListObjectsV2",
            self.settings.lister.list_timeout,
            self.store.list_page("", None, 1),
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("empty metadata body")]
    Empty,
    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Newest first by media timestamp, else metadata timestamp. Records with
/// neither go last; the sort is stable so ties keep input order.
pub fn sort_newest_first(records: &mut [PairedRecord]) {
    records.sort_by(|a, b| best_timestamp(b).cmp(&best_timestamp(a)));
}

fn best_timestamp(record: &PairedRecord) -> Option<chrono::DateTime<chrono::Utc>> {
    record
        .media_object
        .as_ref()
        .and_then(|m| m.last_modified)
        .or(record.metadata_object.last_modified)
}

fn clamp_param(value: Option<i64>, default: usize, max: usize) -> usize {
    match value {
        Some(v) => v.clamp(1, max as i64) as usize,
        None => default,
    }
}
