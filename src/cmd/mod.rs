pub mod check;
pub mod process;
pub mod serve;

use std::sync::Arc;

use anyhow::{Context, Result};

use poseflow::pipeline::ProcessVideo;
use poseflow::pose::{MoveNetEstimator, PoseOverlay};
use poseflow::storage::{StorageService, TempFileManager};
use poseflow::video::Ffmpeg;
use poseflow::AppConfig;

/// Load the model and wire the use case around `storage`
pub async fn build_use_case(
    config: &AppConfig,
    storage: Arc<dyn StorageService>,
) -> Result<ProcessVideo> {
    let estimator = MoveNetEstimator::load(config.model.clone())
        .await
        .with_context(|| format!("failed to load pose model {}", config.model.model_path.display()))?;

    let temp = TempFileManager::new(config.temp.base_dir.as_deref())
        .context("failed to create temp directory")?;

    Ok(ProcessVideo::new(
        Arc::new(estimator),
        storage,
        Arc::new(temp),
        Ffmpeg::new(config.video.ffmpeg.clone()),
    )
    .with_config(config.pipeline())
    .with_overlay(PoseOverlay::default()))
}
