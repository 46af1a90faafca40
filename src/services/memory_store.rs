//! In-memory `ObjectStore` used by tests.
//!
//! Supports injected latency and listing failures, and records how many
//! content/probe calls were in flight at once.

use crate::{
    models::object::{ObjectBody, ObjectDescriptor, ObjectPage},
    services::store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream;
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    content_delay: Mutex<Option<Duration>>,
    head_delay: Mutex<Option<Duration>>,
    fail_listing: AtomicBool,
    list_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, data: impl Into<Bytes>) {
        let fixed = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).single();
        self.put_at(key, data, fixed);
    }

    pub fn put_at(&self, key: &str, data: impl Into<Bytes>, last_modified: Option<DateTime<Utc>>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
            },
        );
    }

    pub fn set_content_delay(&self, delay: Duration) {
        *self.content_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_head_delay(&self, delay: Duration) {
        *self.head_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, key: &str) -> StoreResult<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn tracked<T>(&self, delay: Option<Duration>, work: impl FnOnce() -> T) -> T {
        let _slot = InFlight::enter(&self.in_flight, &self.max_in_flight);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        work()
    }
}

/// Counts a call as in flight until dropped, including when a timeout
/// drops the call's future.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> StoreResult<ObjectPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("listing unavailable".into()));
        }

        let objects = self.objects.lock().unwrap();
        let lower = match continuation_token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };
        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .filter(|(key, _)| key.starts_with(prefix));

        let mut page = ObjectPage::default();
        for (key, obj) in matching.by_ref().take(max_keys) {
            page.objects.push(ObjectDescriptor {
                key: key.clone(),
                size: Some(obj.data.len() as i64),
                last_modified: obj.last_modified,
            });
        }
        if matching.next().is_some() {
            page.is_truncated = true;
            page.next_continuation_token = page.objects.last().map(|o| o.key.clone());
        }
        Ok(page)
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        let delay = *self.content_delay.lock().unwrap();
        self.tracked(delay, || self.lookup(key).map(|obj| obj.data))
            .await
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectDescriptor> {
        let delay = *self.head_delay.lock().unwrap();
        self.tracked(delay, || {
            self.lookup(key).map(|obj| ObjectDescriptor {
                key: key.to_string(),
                size: Some(obj.data.len() as i64),
                last_modified: obj.last_modified,
            })
        })
        .await
    }

    async fn open(&self, key: &str) -> StoreResult<ObjectBody> {
        let obj = self.lookup(key)?;
        Ok(ObjectBody {
            content_type: None,
            content_length: Some(obj.data.len() as i64),
            etag: None,
            stream: Box::pin(stream::iter(vec![Ok(obj.data)])),
        })
    }
}
