//! Derives the storage key of a recording from its metadata.
//!
//! Media URLs come in three shapes, chosen by inspecting the URL host:
//! - virtual-hosted: `https://<bucket>.<region>.digitaloceanspaces.com/<key>`
//! - path-style:     `https://<region>.digitaloceanspaces.com/<bucket>/<key>`
//! - anything else (CDN hosts, other buckets): drop the first path segment.
//!
//! The generic shape is a guess; nothing checks the resulting key exists
//! other than the later HEAD probe.

use crate::models::recording::MediaReference;
use url::Url;

pub const DEFAULT_PROVIDER_DOMAIN: &str = "digitaloceanspaces.com";

/// How the bucket is encoded in a media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStyle {
    VirtualHosted,
    PathStyle,
    Generic,
}

impl AddressStyle {
    /// Strip the bucket portion from a path (leading slashes removed).
    fn key_from_path(self, path: &str, bucket: &str) -> Option<String> {
        let key = match self {
            AddressStyle::VirtualHosted => path,
            AddressStyle::PathStyle => path
                .strip_prefix(bucket)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(path),
            AddressStyle::Generic => match path.split_once('/') {
                Some((_, rest)) => rest,
                None => path,
            },
        };
        non_empty(key)
    }
}

/// Resolves media keys for one bucket.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    bucket: String,
    provider_domains: Vec<String>,
}

impl KeyResolver {
    pub fn new(bucket: impl Into<String>, provider_domains: Vec<String>) -> Self {
        let provider_domains = provider_domains
            .into_iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            bucket: bucket.into(),
            provider_domains,
        }
    }

    /// Key of the media object referenced by a metadata object.
    ///
    /// The URL wins whenever it yields a key; the bare filename is resolved
    /// against the metadata object's own directory.
    pub fn resolve(&self, metadata_key: &str, media: &MediaReference) -> Option<String> {
        media
            .location
            .as_deref()
            .and_then(|location| self.key_from_location(location))
            .or_else(|| {
                media
                    .filename
                    .as_deref()
                    .map(|filename| key_in_same_dir(metadata_key, filename))
            })
    }

    pub fn key_from_location(&self, location: &str) -> Option<String> {
        let url = Url::parse(location).ok()?;
        let path = url.path().trim_start_matches('/');
        let style = self.style_for(&url, path);
        style.key_from_path(path, &self.bucket)
    }

    pub fn style_for(&self, url: &Url, path: &str) -> AddressStyle {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !self.is_provider_host(&host) || self.bucket.is_empty() {
            return AddressStyle::Generic;
        }

        let first_label = host.split('.').next().unwrap_or_default();
        if first_label == self.bucket {
            AddressStyle::VirtualHosted
        } else if path
            .strip_prefix(self.bucket.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
        {
            AddressStyle::PathStyle
        } else {
            AddressStyle::Generic
        }
    }

    fn is_provider_host(&self, host: &str) -> bool {
        self.provider_domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|head| head.ends_with('.'))
        })
    }
}

/// `2025-08/abc.json` + `abc.mp4` -> `2025-08/abc.mp4`.
pub fn key_in_same_dir(metadata_key: &str, filename: &str) -> String {
    let dir = match metadata_key.rfind('/') {
        Some(idx) => &metadata_key[..=idx],
        None => "",
    };
    format!("{}{}", dir, filename)
}

fn non_empty(key: &str) -> Option<String> {
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
