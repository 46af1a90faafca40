use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{AppConfig, Backend};
use services::{
    local_store::LocalStore, recording_service::RecordingService, s3_store::S3Store,
    store::ObjectStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting recordings-index with config: {:?}", cfg);

    if cfg.bucket.is_empty() {
        tracing::warn!(
            "No bucket configured (RECORDINGS_BUCKET); listing requests will fail until one is set"
        );
    }

    // --- Initialize storage backend ---
    let store: Arc<dyn ObjectStore> = match cfg.backend {
        Backend::S3 => Arc::new(S3Store::connect(&cfg.s3_settings()).await),
        Backend::Local => {
            if !Path::new(&cfg.local_root).exists() {
                tracing::warn!("Local bucket directory {} does not exist", cfg.local_root);
            }
            Arc::new(LocalStore::new(&cfg.local_root))
        }
    };

    // --- Initialize core service ---
    let recordings = RecordingService::new(
        store,
        cfg.bucket.clone(),
        cfg.provider_domains.clone(),
        cfg.pairing.clone(),
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(recordings);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
