use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use poseflow::api::{build_router, AppState};
use poseflow::storage::S3Storage;
use poseflow::AppConfig;

use super::build_use_case;

pub async fn cmd_serve(config: AppConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;

    let storage = S3Storage::new(&config.storage.s3).context("failed to initialize storage")?;
    let process_video = build_use_case(&config, Arc::new(storage)).await?;

    let state = AppState::new(Arc::new(process_video), config.server.max_upload_bytes());
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("poseflow {} listening on http://{}", poseflow::VERSION, addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
