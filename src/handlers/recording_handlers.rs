//! HTTP handlers for the recordings listing and single-file endpoints.
//! Object bodies are streamed without buffering; pairing logic lives in
//! `RecordingService`.

use crate::{
    errors::AppError,
    handlers::session::Tenant,
    models::object::ObjectBody,
    services::{
        context::RequestContext,
        recording_service::{ListRecordingsRequest, RecordingService},
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{Instrument, info_span};

/// Cursor for the next batch, when the scan stopped before the end.
pub const NEXT_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-next-continuation-token");

/// Query params accepted by `GET /api/spaces/list`.
///
/// Counts stay raw strings so a malformed value falls back to the clamp
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordingsQuery {
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub json_limit: Option<String>,
    pub json_concurrency: Option<String>,
}

/// Query params accepted by `GET /api/spaces/file`.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    pub key: Option<String>,
    pub download: Option<String>,
}

/// `GET /api/spaces/list` — a bounded batch of paired records, newest first.
///
/// The body is a flat JSON array. When more metadata objects remain, the
/// listing cursor is sent in `x-next-continuation-token`.
pub async fn list_recordings(
    State(service): State<RecordingService>,
    tenant: Tenant,
    Query(q): Query<ListRecordingsQuery>,
) -> Result<Response, AppError> {
    let ctx = RequestContext::new();
    let _cancel_on_disconnect = ctx.cancel_on_drop();
    let span = info_span!("list_recordings", request_id = %ctx.id(), tenant = %tenant.id());

    let req = ListRecordingsRequest {
        prefix: q.prefix,
        continuation_token: q.continuation_token.filter(|t| !t.is_empty()),
        json_limit: q.json_limit.as_deref().and_then(parse_count),
        json_concurrency: q.json_concurrency.as_deref().and_then(parse_count),
        ..ListRecordingsRequest::new(tenant.0)
    };

    let batch = service
        .list_recordings(&ctx, &req)
        .instrument(span)
        .await
        .inspect_err(|err| tracing::error!("[spaces/list] {}", err))?;

    let mut response = Json(batch.records).into_response();
    if let Some(next) = batch.next_continuation_token {
        if let Ok(value) = HeaderValue::from_str(&next) {
            response.headers_mut().insert(NEXT_TOKEN_HEADER, value);
        }
    }
    Ok(response)
}

/// `GET /api/spaces/file?key=<key>[&download=1]` — stream one object.
///
/// Only keys under the caller's tenant prefix are served.
pub async fn get_file(
    State(service): State<RecordingService>,
    tenant: Tenant,
    Query(q): Query<FileQuery>,
) -> Result<Response, AppError> {
    let key = q
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing key"))?;
    let download = matches!(q.download.as_deref(), Some("1") | Some("true"));

    let ctx = RequestContext::new();
    let object = service
        .open_object(&ctx, tenant.id(), &key)
        .await
        .inspect_err(|err| tracing::error!("[spaces/file] {}: {}", key, err))?;

    let mut headers = HeaderMap::new();
    set_object_headers(&mut headers, &object, &key, download);

    let mut response = Response::new(Body::from_stream(object.stream));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Empty reads as zero and fractions truncate; anything else non-numeric
/// means "use the default".
fn parse_count(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn set_object_headers(headers: &mut HeaderMap, object: &ObjectBody, key: &str, download: bool) {
    if let Some(value) = object
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(header::CONTENT_TYPE, value);
    }

    if let Some(length) = object.content_length.filter(|len| *len >= 0) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    if let Some(value) = object
        .etag
        .as_deref()
        .and_then(|etag| HeaderValue::from_str(etag).ok())
    {
        headers.insert(header::ETAG, value);
    }

    if download {
        let filename = key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("download")
            .replace('"', "");
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
}
