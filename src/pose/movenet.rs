//! MoveNet `MultiPose` estimator on ONNX Runtime
//!
//! Model contract:
//! - input: `int32 [1, T, T, 3]` RGB, `T` a multiple of 32 (256 by default)
//! - output: `float32 [1, 6, 56]`, per instance 17 × `(y, x, score)`
//!   followed by `(ymin, xmin, ymax, xmax, score)` of the person box

use async_trait::async_trait;
use futures::StreamExt;
use image::RgbImage;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{Keypoint, KeypointName, Letterbox, Point2D, Pose, PoseEstimator};
use crate::error::{Error, Result};

const NUM_KEYPOINTS: usize = 17;
/// 17 keypoints × (y, x, score)
const KEYPOINT_DATA_SIZE: usize = NUM_KEYPOINTS * 3;
const BBOX_SCORE_INDEX: usize = 55;
const INSTANCE_SIZE: usize = 56;

/// Configuration for [`MoveNetEstimator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveNetConfig {
    /// Local path of the ONNX model
    pub model_path: PathBuf,
    /// Where to fetch the model from when `model_path` does not exist
    pub model_url: Option<String>,
    /// Square input size fed to the model
    pub target_size: u32,
    /// Minimum person (bounding box) score to report a pose
    pub score_threshold: f32,
    /// Name of the model's image input
    pub input_name: String,
    /// Name of the model's keypoint output
    pub output_name: String,
    /// Intra-op thread count (0 lets ONNX Runtime decide)
    pub intra_threads: usize,
}

impl Default for MoveNetConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/movenet_multipose_lightning.onnx"),
            model_url: None,
            target_size: 256,
            score_threshold: 0.2,
            input_name: "input".to_string(),
            output_name: "output_0".to_string(),
            intra_threads: 0,
        }
    }
}

impl MoveNetConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(Error::InvalidInput(format!(
                "score_threshold must be between 0.0 and 1.0, got {}",
                self.score_threshold
            )));
        }
        if self.target_size == 0 || self.target_size % 32 != 0 {
            return Err(Error::InvalidInput(format!(
                "target_size must be a positive multiple of 32, got {}",
                self.target_size
            )));
        }
        Ok(())
    }
}

fn model_err<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> Error {
    move |e| Error::PoseEstimation(format!("{context}: {e}"))
}

/// MoveNet `MultiPose` estimator (up to six people per frame)
///
/// Preprocessing, inference and decoding run on tokio's blocking pool.
pub struct MoveNetEstimator {
    config: Arc<MoveNetConfig>,
    session: Arc<Mutex<Session>>,
}

impl MoveNetEstimator {
    /// Load the model, downloading it first if needed, and warm it up
    pub async fn load(config: MoveNetConfig) -> Result<Self> {
        config.validate()?;

        if !config.model_path.exists() {
            match config.model_url.as_deref() {
                Some(url) => download_model(url, &config.model_path).await?,
                None => {
                    return Err(Error::PoseEstimation(format!(
                        "model not found at {} and no model_url configured",
                        config.model_path.display()
                    )))
                }
            }
        }

        info!("Loading MoveNet model from {}", config.model_path.display());

        let mut builder = Session::builder()
            .map_err(model_err("failed to create session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err("failed to set optimization level"))?;

        if config.intra_threads > 0 {
            builder = builder
                .with_intra_threads(config.intra_threads)
                .map_err(model_err("failed to set intra threads"))?;
        }

        let session = builder
            .commit_from_file(&config.model_path)
            .map_err(model_err("failed to load model"))?;

        let estimator = Self {
            config: Arc::new(config),
            session: Arc::new(Mutex::new(session)),
        };

        estimator.warmup().await?;
        info!("MoveNet model ready (input {0}x{0})", estimator.config.target_size);

        Ok(estimator)
    }

    #[must_use]
    pub fn config(&self) -> &MoveNetConfig {
        &self.config
    }

    /// Run one inference on a black frame so the first real frame is not slow
    async fn warmup(&self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let t = config.target_size as usize;
            infer(&session, &config, vec![0; t * t * 3])
        })
        .await
        .map_err(model_err("warm-up task failed"))??;

        debug!("MoveNet warm-up complete");
        Ok(())
    }
}

/// Run the model on letterboxed NHWC data, returning the raw output
fn infer(session: &Mutex<Session>, config: &MoveNetConfig, pixels: Vec<i32>) -> Result<Vec<f32>> {
    let t = config.target_size as usize;
    let input = Tensor::from_array(([1usize, t, t, 3], pixels))
        .map_err(model_err("failed to build input tensor"))?;

    let mut session = session
        .lock()
        .map_err(|_| Error::PoseEstimation("model session lock poisoned".to_string()))?;
    let outputs = session
        .run(ort::inputs![config.input_name.as_str() => input])
        .map_err(model_err("inference failed"))?;

    let (_, data) = outputs[config.output_name.as_str()]
        .try_extract_tensor::<f32>()
        .map_err(model_err("unexpected model output"))?;

    Ok(data.to_vec())
}

#[async_trait]
impl PoseEstimator for MoveNetEstimator {
    async fn estimate(&self, frame: &RgbImage) -> Result<Vec<Pose>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::PoseEstimation(format!(
                "Image dimensions must be positive, got {width}x{height}"
            )));
        }

        let config = Arc::clone(&self.config);
        let session = Arc::clone(&self.session);
        let frame = frame.clone();

        tokio::task::spawn_blocking(move || {
            let letterbox = Letterbox::compute(width, height, config.target_size);
            let output = infer(&session, &config, letterbox.apply(&frame))?;
            parse_instances(&output, &letterbox, config.score_threshold)
        })
        .await
        .map_err(model_err("inference task failed"))?
    }
}

/// Decode the `[1, N, 56]` output into poses above `threshold`
pub fn parse_instances(output: &[f32], letterbox: &Letterbox, threshold: f32) -> Result<Vec<Pose>> {
    if output.len() % INSTANCE_SIZE != 0 {
        return Err(Error::PoseEstimation(format!(
            "model output length {} is not a multiple of {INSTANCE_SIZE}",
            output.len()
        )));
    }

    let mut poses = Vec::new();

    for instance in output.chunks_exact(INSTANCE_SIZE) {
        let bbox_score = instance[BBOX_SCORE_INDEX];
        if bbox_score < threshold {
            continue;
        }

        let keypoints = instance[..KEYPOINT_DATA_SIZE]
            .chunks_exact(3)
            .zip(KeypointName::ALL)
            .map(|(raw, name)| {
                let (x, y) = letterbox.to_original(raw[0], raw[1]);
                Keypoint::new(name, Point2D::new(x, y)?, raw[2].clamp(0.0, 1.0))
            })
            .collect::<Result<Vec<_>>>()?;

        poses.push(Pose {
            frame_index: 0,
            keypoints,
            overall_score: bbox_score.clamp(0.0, 1.0),
        });
    }

    Ok(poses)
}

/// Stream the model from `url` to `path`, via a temporary sibling file
async fn download_model(url: &str, path: &Path) -> Result<()> {
    info!("Downloading pose model from {url}");

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = reqwest::get(url)
        .await
        .map_err(model_err("failed to download model"))?;

    if !response.status().is_success() {
        return Err(Error::PoseEstimation(format!(
            "failed to download model: HTTP {}",
            response.status()
        )));
    }

    let partial = path.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(model_err("failed to read model bytes"))?;
        file.write_all(&chunk).await?;
        total += chunk.len();
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, path).await?;

    info!("Pose model downloaded ({} bytes)", total);
    Ok(())
}
