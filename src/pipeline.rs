//! Process-video use case
//!
//! Decodes an input video, runs pose estimation on every frame, draws the
//! skeletons back onto the frames, re-encodes, reattaches the original audio,
//! uploads the result and returns a signed download URL.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{DurationBound, Error, Result};
use crate::pose::{Pose, PoseEstimator, PoseOverlay};
use crate::storage::{validate_key, StorageService, TempFileManager};
use crate::video::{
    AudioMerger, Ffmpeg, Frame, VideoMeta, VideoSinkFactory, VideoSourceFactory,
};

/// Limits applied to every processed video
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Shortest accepted video, in seconds
    pub min_duration_sec: f64,
    /// Longest accepted video, in seconds
    pub max_duration_sec: f64,
    /// Lifetime of the returned download URL
    pub url_expiry_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_duration_sec: 3.0,
            max_duration_sec: 420.0,
            url_expiry_secs: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessVideoInput {
    /// Local file to process
    pub input_path: PathBuf,
    /// Storage key for the rendered video
    pub output_key: String,
    /// Poses scoring below this are dropped, `[0.0, 1.0]`
    pub score_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoResult {
    pub signed_url: String,
    pub video_meta: VideoMeta,
    /// Poses drawn across all frames
    pub total_poses: u64,
    pub processing_time_sec: f64,
}

/// The process-video use case with all of its collaborators
pub struct ProcessVideo {
    config: PipelineConfig,
    estimator: Arc<dyn PoseEstimator>,
    storage: Arc<dyn StorageService>,
    temp: Arc<TempFileManager>,
    sources: Arc<dyn VideoSourceFactory>,
    sinks: Arc<dyn VideoSinkFactory>,
    merger: Arc<dyn AudioMerger>,
    overlay: Arc<PoseOverlay>,
}

impl ProcessVideo {
    /// Build the use case with ffmpeg handling decode, encode and muxing
    pub fn new(
        estimator: Arc<dyn PoseEstimator>,
        storage: Arc<dyn StorageService>,
        temp: Arc<TempFileManager>,
        ffmpeg: Ffmpeg,
    ) -> Self {
        let ffmpeg = Arc::new(ffmpeg);
        Self {
            config: PipelineConfig::default(),
            estimator,
            storage,
            temp,
            sources: ffmpeg.clone(),
            sinks: ffmpeg.clone(),
            merger: ffmpeg,
            overlay: Arc::new(PoseOverlay::default()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_overlay(mut self, overlay: PoseOverlay) -> Self {
        self.overlay = Arc::new(overlay);
        self
    }

    /// Replace the video backends, e.g. with in-memory implementations
    #[must_use]
    pub fn with_video_backends(
        mut self,
        sources: Arc<dyn VideoSourceFactory>,
        sinks: Arc<dyn VideoSinkFactory>,
        merger: Arc<dyn AudioMerger>,
    ) -> Self {
        self.sources = sources;
        self.sinks = sinks;
        self.merger = merger;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn temp(&self) -> &Arc<TempFileManager> {
        &self.temp
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    /// Run the full pipeline for one video
    pub async fn execute(&self, input: ProcessVideoInput) -> Result<ProcessVideoResult> {
        if !(0.0..=1.0).contains(&input.score_threshold) {
            return Err(Error::InvalidInput(format!(
                "score_threshold must be between 0.0 and 1.0, got {}",
                input.score_threshold
            )));
        }
        validate_key(&input.output_key)?;

        let started = Instant::now();
        info!("Processing video: {}", input.input_path.display());

        // 1. Scratch files for the silent render and the muxed output,
        //    removed whenever this function returns or is cancelled
        let no_audio = self.temp.scoped_temp_path("_no_audio.mp4");
        let with_audio = self.temp.scoped_temp_path(".mp4");

        let (video_meta, total_poses) = self.render(&input, no_audio.path()).await?;

        // 6. Reattach audio when the source had any
        let upload_path = if video_meta.has_audio {
            self.merger
                .merge_audio(no_audio.path(), &input.input_path, with_audio.path())
                .await?;
            with_audio.path()
        } else {
            no_audio.path()
        };

        // 7. Upload and sign
        let key = self.storage.upload(upload_path, &input.output_key).await?;
        let signed_url = self
            .storage
            .signed_download_url(&key, Duration::from_secs(self.config.url_expiry_secs))
            .await?;

        let processing_time_sec = started.elapsed().as_secs_f64();
        info!(
            "Processed {} in {:.2}s ({} poses)",
            key, processing_time_sec, total_poses
        );

        Ok(ProcessVideoResult {
            signed_url,
            video_meta,
            total_poses,
            processing_time_sec,
        })
    }

    /// Steps 2-5: decode, estimate, draw and encode into `output`
    async fn render(&self, input: &ProcessVideoInput, output: &Path) -> Result<(VideoMeta, u64)> {
        let mut source = self.sources.open(&input.input_path).await?;
        let meta = source.meta().clone();
        self.check_duration(meta.duration_sec)?;

        info!(
            "Video: {}x{} @ {:.2} fps, {} frames, {:.1}s, audio={}",
            meta.width, meta.height, meta.fps, meta.total_frames, meta.duration_sec, meta.has_audio
        );

        let mut sink = self.sinks.create(output, meta.fps);
        let mut total_poses = 0u64;

        while let Some(Frame { index, image }) = source.next_frame().await? {
            let poses: Vec<Pose> = self
                .estimator
                .estimate(&image)
                .await?
                .into_iter()
                .filter(|p| p.overall_score >= input.score_threshold)
                .map(|mut p| {
                    p.frame_index = index;
                    p
                })
                .collect();

            total_poses += poses.len() as u64;
            let image = self.draw(image, poses).await?;
            sink.write_frame(&image).await?;
        }

        let written = sink.finish().await?;
        debug!("Rendered {} frames to {}", written, output.display());

        Ok((meta, total_poses))
    }

    /// Draw `poses` onto `image` on the blocking pool
    async fn draw(&self, mut image: RgbImage, poses: Vec<Pose>) -> Result<RgbImage> {
        if poses.is_empty() {
            return Ok(image);
        }
        let overlay = Arc::clone(&self.overlay);
        tokio::task::spawn_blocking(move || {
            overlay.draw(&mut image, &poses);
            image
        })
        .await
        .map_err(|e| Error::VideoEncoding(format!("overlay task failed: {e}")))
    }

    fn check_duration(&self, duration_sec: f64) -> Result<()> {
        if duration_sec < self.config.min_duration_sec {
            return Err(Error::VideoDuration {
                bound: DurationBound::TooShort,
                duration_sec,
                limit_sec: self.config.min_duration_sec,
            });
        }
        if duration_sec > self.config.max_duration_sec {
            return Err(Error::VideoDuration {
                bound: DurationBound::TooLong,
                duration_sec,
                limit_sec: self.config.max_duration_sec,
            });
        }
        Ok(())
    }
}
