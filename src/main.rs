use anyhow::Result;
use doc_store::{
    DocumentStore, MemoryClient, ObjectClient, S3Client, StorageSettings,
    config::{AppConfig, Backend, resolve_url_expiry},
};
use std::{env, io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting doc-store with config: {:?}", cfg);

    // --- Build storage client ---
    let (client, url_expiry): (Arc<dyn ObjectClient>, Duration) = match cfg.backend {
        Backend::S3 => {
            let settings = StorageSettings::from_env(cfg.storage.clone())?;
            tracing::debug!("Resolved storage settings => {:?}", settings);
            (
                Arc::new(S3Client::from_settings(&settings)),
                settings.url_expiry,
            )
        }
        Backend::Memory => {
            tracing::warn!("Using in-memory storage; documents are lost on exit");
            let url_expiry =
                resolve_url_expiry(cfg.storage.url_expiry_secs, &|name: &str| env::var(name).ok())?;
            (Arc::new(MemoryClient::new()), url_expiry)
        }
    };

    // --- Initialize core service ---
    let store = DocumentStore::initialize(client, &cfg.bucket, &cfg.collection, cfg.policy)
        .await?
        .with_url_expiry(url_expiry);

    // --- Build router ---
    let app = doc_store::create_router(store);

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
