//! src/services/local_store.rs
//!
//! LocalStore — a directory on disk served as a bucket. Object keys are
//! paths relative to `base_path`. Meant for local development against a copy
//! of a recordings bucket; listing walks the directory below the prefix, so
//! it is not meant for large trees.

use crate::{
    models::object::{ObjectBody, ObjectDescriptor, ObjectPage},
    services::store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::debug;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Clone, Debug)]
pub struct LocalStore {
    /// Directory that plays the role of the bucket.
    pub base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/`, contain `..`, backslashes or
    /// control characters.
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        if key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        self.ensure_key_safe(key)?;
        Ok(self.base_path.join(key))
    }

    /// Collect every file key under the directory part of `prefix`.
    async fn walk_keys(&self, prefix: &str) -> StoreResult<Vec<(String, std::fs::Metadata)>> {
        let start_dir = match prefix.rfind('/') {
            Some(idx) => {
                self.ensure_key_safe(&prefix[..idx])?;
                self.base_path.join(&prefix[..idx])
            }
            None => self.base_path.clone(),
        };

        let mut found = Vec::new();
        let mut pending = vec![start_dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                let path = entry.path();
                if meta.is_dir() {
                    pending.push(path);
                } else if meta.is_file() {
                    if let Some(key) = self.key_for(&path) {
                        if key.starts_with(prefix) {
                            found.push((key, meta));
                        }
                    }
                }
            }
        }
        Ok(found)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    async fn open_file(&self, key: &str) -> StoreResult<(File, std::fs::Metadata)> {
        let path = self.object_path(key)?;
        let file = File::open(&path).await.map_err(|err| not_found_or_io(err, key))?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok((file, meta))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    /// Keys come back in lexicographic order. The continuation token is the
    /// base64 of the last key returned.
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> StoreResult<ObjectPage> {
        let max_keys = max_keys.clamp(1, 1000);
        let after = continuation_token.map(decode_continuation_token);

        let mut keys = self.walk_keys(prefix).await?;
        keys.retain(|(key, _)| after.as_deref().is_none_or(|after| key.as_str() > after));
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        let is_truncated = keys.len() > max_keys;
        keys.truncate(max_keys);
        let next_continuation_token = if is_truncated {
            keys.last().map(|(key, _)| encode_continuation_token(key))
        } else {
            None
        };

        debug!(prefix, returned = keys.len(), is_truncated, "listed local directory");

        Ok(ObjectPage {
            objects: keys
                .into_iter()
                .map(|(key, meta)| descriptor(key, &meta))
                .collect(),
            is_truncated,
            next_continuation_token,
        })
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        let path = self.object_path(key)?;
        let data = fs::read(&path)
            .await
            .map_err(|err| not_found_or_io(err, key))?;
        Ok(Bytes::from(data))
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectDescriptor> {
        let path = self.object_path(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|err| not_found_or_io(err, key))?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(descriptor(key.to_string(), &meta))
    }

    async fn open(&self, key: &str) -> StoreResult<ObjectBody> {
        let (file, meta) = self.open_file(key).await?;
        Ok(ObjectBody {
            content_type: Some(content_type_for(key).to_string()),
            content_length: Some(meta.len() as i64),
            etag: None,
            stream: Box::pin(ReaderStream::new(file)),
        })
    }
}

fn descriptor(key: String, meta: &std::fs::Metadata) -> ObjectDescriptor {
    ObjectDescriptor {
        key,
        size: Some(meta.len() as i64),
        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }
}

fn not_found_or_io(err: io::Error, key: &str) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(err)
    }
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => "application/json",
        Some("mp4") => "video/mp4",
        Some("ogg") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

fn encode_continuation_token(key: &str) -> String {
    general_purpose::STANDARD.encode(key)
}

fn decode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| token.to_string())
}
