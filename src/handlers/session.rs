//! Tenant identity, taken from the `user` session cookie.
//!
//! The login flow stores `{"trunkId": "...", ...}` as JSON in that cookie,
//! usually percent-encoded. Authentication itself happens upstream; this
//! only reads the tenant identifier.

use crate::errors::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use serde_json::Value;

pub const SESSION_COOKIE: &str = "user";

/// The caller's tenant (trunk) identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant(pub String);

impl Tenant {
    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let raw = cookie_value(headers, SESSION_COOKIE)?;
        trunk_id(&raw).map(Tenant)
    }
}

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Tenant::from_headers(&parts.headers).ok_or_else(|| AppError::unauthorized("Missing trunk ID"))
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

fn trunk_id(raw: &str) -> Option<String> {
    let session: Value = serde_json::from_str(raw).ok().or_else(|| {
        let decoded = url::form_urlencoded::parse(raw.as_bytes())
            .next()
            .map(|(k, _)| k.into_owned())?;
        serde_json::from_str(&decoded).ok()
    })?;

    let id = match session.get("trunkId")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() || id.contains('/') { None } else { Some(id) }
}
