pub mod context;
pub mod key_resolver;
pub mod lister;
pub mod local_store;
#[cfg(test)]
pub mod memory_store;
pub mod recording_service;
pub mod s3_store;
pub mod store;
