//! Data models for the recordings listing pipeline.
//!
//! Object descriptors come from the storage backend, metadata payloads are
//! parsed from the JSON logs written next to each recording, and paired
//! records are what the listing endpoint returns.

pub mod object;
pub mod recording;
