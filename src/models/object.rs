//! Represents objects as reported by the storage backend.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::BoxStream;
use serde::{Serialize, Serializer};
use std::{fmt, io};

/// Identity of one stored object as returned by a listing or probe call.
///
/// The struct never carries content bytes; it is created fresh per request.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes, when the backend reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// Last modification time, serialized as ISO-8601 with milliseconds.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_timestamp"
    )]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectDescriptor {
    /// A descriptor that only knows its key.
    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
        }
    }
}

/// One page of a listing call.
#[derive(Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectDescriptor>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// An opened object ready to be streamed to a client.
pub struct ObjectBody {
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub etag: Option<String>,
    pub stream: BoxStream<'static, io::Result<Bytes>>,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

fn serialize_timestamp<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn serializes_timestamp_with_millis_and_skips_missing_fields() {
        let descriptor = ObjectDescriptor {
            key: "t1/2025-08/a.mp4".into(),
            size: Some(42),
            last_modified: Some(Utc.with_ymd_and_hms(2025, 8, 3, 10, 0, 0).unwrap()),
        };
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "key": "t1/2025-08/a.mp4",
                "size": 42,
                "lastModified": "2025-08-03T10:00:00.000Z"
            })
        );

        let bare = ObjectDescriptor::key_only("t1/a.mp4");
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({ "key": "t1/a.mp4" }));
    }
}
