//! Call-recording metadata and the paired records built from it.

use crate::models::object::ObjectDescriptor;
use serde::Serialize;
use serde_json::Value;

/// Nanoseconds per second; `started_at`/`ended_at` are logged in ns.
const NANOS_PER_SECOND: f64 = 1e9;

/// Reference to the media file named in a metadata payload (`files[0]`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaReference {
    /// Absolute URL of the uploaded file.
    pub location: Option<String>,
    /// Bare filename, relative to the metadata object's directory.
    pub filename: Option<String>,
}

/// The fields of a metadata object the pipeline consumes.
///
/// Every field is read defensively: a value of the wrong JSON type is
/// treated the same as a missing one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPayload {
    pub egress_id: Option<String>,
    pub room_id: Option<String>,
    pub room_name: Option<String>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub media: MediaReference,
}

impl MetadataPayload {
    /// Parse raw metadata bytes. Fails only when the bytes are not JSON.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(raw)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        Self {
            egress_id: string_field(value, "egress_id"),
            room_id: string_field(value, "room_id"),
            room_name: string_field(value, "room_name"),
            started_at: value.get("started_at").and_then(as_timestamp),
            ended_at: value.get("ended_at").and_then(as_timestamp),
            media: media_reference(value),
        }
    }

    /// Phone number embedded in the room name, e.g.
    /// `call2_00306932886053_TYs96ZyAYYig` -> `00306932886053`.
    pub fn phone_number(&self) -> Option<String> {
        phone_from_room_name(self.room_name.as_deref())
    }

    /// Call duration in seconds, rounded to milliseconds.
    pub fn duration_seconds(&self) -> Option<f64> {
        duration_from_nanos(self.started_at, self.ended_at)
    }
}

/// One metadata object paired with its (possibly unverified) media object.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PairedRecord {
    pub egress_id: Option<String>,
    pub room_id: Option<String>,
    pub room_name: Option<String>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub phone_number: Option<String>,
    pub metadata_object: ObjectDescriptor,
    pub media_object: Option<ObjectDescriptor>,
}

impl PairedRecord {
    /// Build a record from a parsed payload.
    ///
    /// `media_key` is the derived companion key and `probed` the result of
    /// the existence probe. A derived key without a probe result still yields
    /// a key-only media object.
    pub fn assemble(
        metadata_object: ObjectDescriptor,
        payload: &MetadataPayload,
        media_key: Option<String>,
        probed: Option<ObjectDescriptor>,
    ) -> Self {
        let media_object = match (probed, media_key) {
            (Some(found), _) => Some(found),
            (None, Some(key)) => Some(ObjectDescriptor::key_only(key)),
            (None, None) => None,
        };

        Self {
            egress_id: payload.egress_id.clone(),
            room_id: payload.room_id.clone(),
            room_name: payload.room_name.clone(),
            started_at: payload.started_at,
            ended_at: payload.ended_at,
            duration_seconds: payload.duration_seconds(),
            phone_number: payload.phone_number(),
            metadata_object,
            media_object,
        }
    }

    /// Record for a metadata object whose content could not be used.
    pub fn degraded(metadata_object: ObjectDescriptor) -> Self {
        Self {
            egress_id: None,
            room_id: None,
            room_name: None,
            started_at: None,
            ended_at: None,
            duration_seconds: None,
            phone_number: None,
            metadata_object,
            media_object: None,
        }
    }
}

pub fn phone_from_room_name(room_name: Option<&str>) -> Option<String> {
    let (head, rest) = room_name?.split_once('_')?;
    if head.is_empty() {
        return None;
    }
    let phone = rest.split('_').next().unwrap_or_default();
    if phone.is_empty() {
        None
    } else {
        Some(phone.to_string())
    }
}

/// Equal or inverted timestamps mean "unknown", never zero or negative.
pub fn duration_from_nanos(started_at: Option<i64>, ended_at: Option<i64>) -> Option<f64> {
    let (start, end) = (started_at?, ended_at?);
    if end <= start {
        return None;
    }
    let seconds = (i128::from(end) - i128::from(start)) as f64 / NANOS_PER_SECOND;
    Some((seconds * 1000.0).round() / 1000.0)
}

fn string_field(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(Value::as_str).map(str::to_string)
}

fn as_timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn trimmed(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn media_reference(value: &Value) -> MediaReference {
    let Some(first) = value
        .get("files")
        .and_then(Value::as_array)
        .and_then(|files| files.first())
    else {
        return MediaReference::default();
    };

    MediaReference {
        location: trimmed(first.get("location")),
        filename: trimmed(first.get("filename")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_phone_between_first_and_second_underscore() {
        assert_eq!(
            phone_from_room_name(Some("call2_00306932886053_TYs96ZyAYYig")).as_deref(),
            Some("00306932886053")
        );
        assert_eq!(phone_from_room_name(Some("call_123")).as_deref(), Some("123"));
        assert_eq!(phone_from_room_name(None), None);
        assert_eq!(phone_from_room_name(Some("onlyoneseg")), None);
        assert_eq!(phone_from_room_name(Some("_123_abc")), None);
        assert_eq!(phone_from_room_name(Some("call__abc")), None);
    }

    #[test]
    fn duration_requires_strictly_increasing_timestamps() {
        assert_eq!(
            duration_from_nanos(Some(1_000_000_000), Some(4_500_000_000)),
            Some(3.5)
        );
        assert_eq!(duration_from_nanos(Some(5), Some(5)), None);
        assert_eq!(duration_from_nanos(Some(10), Some(5)), None);
        assert_eq!(duration_from_nanos(None, Some(5)), None);
        assert_eq!(
            duration_from_nanos(Some(0), Some(1_234_567_890)),
            Some(1.235)
        );
    }

    #[test]
    fn duration_survives_extreme_timestamps() {
        let seconds = duration_from_nanos(
            Some(-9_000_000_000_000_000_000),
            Some(9_000_000_000_000_000_000),
        )
        .unwrap();
        assert_eq!(seconds, 18_000_000_000.0);
        let seconds = duration_from_nanos(Some(i64::MIN), Some(i64::MAX)).unwrap();
        assert!(seconds > 0.0);
    }

    #[test]
    fn reads_payload_fields_defensively() {
        let payload = MetadataPayload::from_value(&json!({
            "egress_id": "EG_1",
            "room_id": 17,
            "room_name": "call2_0030_x",
            "started_at": 1_000_000_000i64,
            "ended_at": "later",
            "files": [
                { "filename": "  a.mp4 ", "location": "" },
                { "filename": "ignored.mp4" }
            ]
        }));

        assert_eq!(payload.egress_id.as_deref(), Some("EG_1"));
        assert_eq!(payload.room_id, None);
        assert_eq!(payload.started_at, Some(1_000_000_000));
        assert_eq!(payload.ended_at, None);
        assert_eq!(payload.media.filename.as_deref(), Some("a.mp4"));
        assert_eq!(payload.media.location, None);
        assert_eq!(payload.phone_number().as_deref(), Some("0030"));
    }

    #[test]
    fn non_object_json_yields_empty_payload() {
        let payload = MetadataPayload::parse(b"[1, 2, 3]").unwrap();
        assert_eq!(payload, MetadataPayload::default());
        assert!(MetadataPayload::parse(b"{ not json").is_err());
    }

    #[test]
    fn assemble_emits_key_only_media_when_probe_found_nothing() {
        let meta = ObjectDescriptor::key_only("t/a.json");
        let payload = MetadataPayload::default();

        let record = PairedRecord::assemble(meta.clone(), &payload, Some("t/a.mp4".into()), None);
        assert_eq!(record.media_object, Some(ObjectDescriptor::key_only("t/a.mp4")));

        let record = PairedRecord::assemble(meta.clone(), &payload, None, None);
        assert_eq!(record.media_object, None);
        assert_eq!(record.metadata_object, meta);
    }

    #[test]
    fn record_serializes_with_camel_case_and_nulls() {
        let record = PairedRecord::degraded(ObjectDescriptor::key_only("t/bad.json"));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "egressId": null,
                "roomId": null,
                "roomName": null,
                "startedAt": null,
                "endedAt": null,
                "durationSeconds": null,
                "phoneNumber": null,
                "metadataObject": { "key": "t/bad.json" },
                "mediaObject": null
            })
        );
    }
}
