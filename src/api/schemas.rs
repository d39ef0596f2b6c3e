//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::pipeline::ProcessVideoResult;
use crate::video::VideoMeta;

/// Threshold applied when a request does not specify one
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.2;

fn default_score_threshold() -> f32 {
    DEFAULT_SCORE_THRESHOLD
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Video metadata as reported to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoMetaResponse {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_sec: f64,
    pub has_audio: bool,
}

impl From<VideoMeta> for VideoMetaResponse {
    fn from(meta: VideoMeta) -> Self {
        Self {
            width: meta.width,
            height: meta.height,
            fps: meta.fps,
            duration_sec: meta.duration_sec,
            has_audio: meta.has_audio,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessVideoResponse {
    /// Time-limited download URL of the rendered video
    pub signed_url: String,
    pub video_meta: VideoMetaResponse,
    /// Poses detected across all frames
    pub total_poses: u64,
    pub processing_time_sec: f64,
}

impl From<ProcessVideoResult> for ProcessVideoResponse {
    fn from(result: ProcessVideoResult) -> Self {
        Self {
            signed_url: result.signed_url,
            video_meta: result.video_meta.into(),
            total_poses: result.total_poses,
            processing_time_sec: result.processing_time_sec,
        }
    }
}

/// Process a video previously stored under `key`
#[derive(Debug, Deserialize)]
pub struct ProcessKeyRequest {
    pub key: String,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub key: String,
}

/// Ask for a direct-to-storage upload URL
#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignResponse {
    pub key: String,
    pub upload_url: String,
    /// Seconds until `upload_url` expires
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_key_defaults_threshold() {
        let req: ProcessKeyRequest = serde_json::from_str(r#"{"key": "uploads/a.mp4"}"#).unwrap();
        assert!((req.score_threshold - DEFAULT_SCORE_THRESHOLD).abs() < f32::EPSILON);
    }

    #[test]
    fn meta_response_drops_frame_count() {
        let meta = VideoMeta {
            width: 1920,
            height: 1080,
            fps: 29.97,
            total_frames: 300,
            duration_sec: 10.01,
            has_audio: true,
        };
        let json = serde_json::to_value(VideoMetaResponse::from(meta)).unwrap();
        assert_eq!(json["width"], 1920);
        assert!(json.get("total_frames").is_none());
    }
}
