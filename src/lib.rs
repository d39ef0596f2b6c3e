//! `poseflow` - Pose-estimation video backend
//!
//! # Features
//!
//! - **Pose estimation**: MoveNet `MultiPose` on ONNX Runtime, up to six people per frame
//! - **Rendering**: skeleton overlays drawn onto every frame, re-encoded to H.264
//! - **Audio**: the original soundtrack is muxed back onto the render
//! - **Storage**: S3-compatible buckets (Cloudflare R2) with signed URLs
//! - **HTTP API**: multipart upload or storage key in, signed download URL out
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use poseflow::pipeline::{ProcessVideo, ProcessVideoInput};
//! use poseflow::pose::{MoveNetConfig, MoveNetEstimator};
//! use poseflow::storage::{LocalStorage, TempFileManager};
//! use poseflow::video::Ffmpeg;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let estimator = MoveNetEstimator::load(MoveNetConfig::default()).await?;
//!     let use_case = ProcessVideo::new(
//!         Arc::new(estimator),
//!         Arc::new(LocalStorage::new("out")?),
//!         Arc::new(TempFileManager::new(None)?),
//!         Ffmpeg::default(),
//!     );
//!     let result = use_case
//!         .execute(ProcessVideoInput {
//!             input_path: PathBuf::from("dance.mp4"),
//!             output_key: "dance_poses.mp4".to_string(),
//!             score_threshold: 0.2,
//!         })
//!         .await?;
//!     println!("{} poses -> {}", result.total_poses, result.signed_url);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pose;
pub mod storage;
pub mod video;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use pipeline::{ProcessVideo, ProcessVideoInput, ProcessVideoResult};
pub use pose::{Keypoint, KeypointName, MoveNetEstimator, Point2D, Pose, PoseEstimator};
pub use storage::{LocalStorage, S3Storage, StorageService, TempFileManager};
pub use video::{Ffmpeg, VideoMeta};

/// Version of poseflow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
