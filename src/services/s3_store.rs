//! `ObjectStore` backed by an S3-compatible service (AWS S3, DigitalOcean
//! Spaces, MinIO, ...).

use crate::{
    models::object::{ObjectBody, ObjectDescriptor, ObjectPage},
    services::store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::DateTime as AwsDateTime};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

/// Connection settings for the S3 backend.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from the default AWS config chain plus overrides.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            let credentials = aws_sdk_s3::config::Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "recordings-index",
            );
            loader = loader.credentials_provider(credentials);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        debug!(
            bucket = %settings.bucket,
            endpoint = ?settings.endpoint,
            path_style = settings.force_path_style,
            "created S3 client"
        );

        Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
        }
    }
}

fn to_chrono(ts: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> StoreResult<ObjectPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_keys.min(i32::MAX as usize) as i32);
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }
        if let Some(token) = continuation_token {
            req = req.continuation_token(token);
        }

        let resp = req.send().await.map_err(|e| {
            StoreError::Backend(format!(
                "list s3://{}/{}: {}",
                self.bucket,
                prefix,
                DisplayErrorContext(&e)
            ))
        })?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?;
                Some(ObjectDescriptor {
                    key: key.to_string(),
                    size: obj.size(),
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        Ok(ObjectPage {
            objects,
            is_truncated: resp.is_truncated().unwrap_or(false),
            next_continuation_token: resp.next_continuation_token().map(str::to_string),
        })
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(format!(
                        "get s3://{}/{}: {}",
                        self.bucket,
                        key,
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let data = result
            .body
            .collect()
            .await
            .map_err(|e| {
                StoreError::Backend(format!("read body of s3://{}/{}: {}", self.bucket, key, e))
            })?
            .into_bytes();
        trace!(key = key, size = data.len(), "downloaded object");
        Ok(data)
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectDescriptor> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(format!(
                        "head s3://{}/{}: {}",
                        self.bucket,
                        key,
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        Ok(ObjectDescriptor {
            key: key.to_string(),
            size: Some(head.content_length().unwrap_or(0)),
            last_modified: head.last_modified().and_then(to_chrono),
        })
    }

    async fn open(&self, key: &str) -> StoreResult<ObjectBody> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(format!(
                        "get s3://{}/{}: {}",
                        self.bucket,
                        key,
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        Ok(ObjectBody {
            content_type: out.content_type().map(str::to_string),
            content_length: out.content_length(),
            etag: out.e_tag().map(str::to_string),
            stream: Box::pin(ReaderStream::new(out.body.into_async_read())),
        })
    }
}
