//! Video metadata via ffprobe

use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::VideoMeta;
use crate::error::{Error, Result};

/// Used when the container reports no usable frame rate
pub const FALLBACK_FPS: f64 = 30.0;

#[derive(Debug, Deserialize)]
pub(crate) struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse a rate such as `30000/1001` or `25`; zero denominators yield `None`
fn parse_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => rate.trim().parse().ok(),
    }
}

impl ProbeOutput {
    pub(crate) fn into_meta(self) -> Result<VideoMeta> {
        let video = self
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| Error::VideoProcessing("No video stream found".to_string()))?;

        let has_audio = self
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        let width = video.width.unwrap_or(0);
        let height = video.height.unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(Error::VideoProcessing(format!(
                "Invalid frame size {width}x{height}"
            )));
        }

        let fps = [video.avg_frame_rate.as_deref(), video.r_frame_rate.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(parse_rate)
            .find(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(FALLBACK_FPS);

        let container_duration = self
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .or(video.duration.as_deref())
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);

        let total_frames = video
            .nb_frames
            .as_deref()
            .and_then(|n| n.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
            .or_else(|| container_duration.map(|d| (d * fps).round() as u64))
            .unwrap_or(0);

        let duration_sec =
            container_duration.unwrap_or_else(|| total_frames as f64 / fps);

        Ok(VideoMeta {
            width,
            height,
            fps,
            total_frames,
            duration_sec,
            has_audio,
        })
    }
}

/// Run ffprobe on `path` and return its metadata
pub async fn probe(ffprobe: &Path, path: &Path) -> Result<VideoMeta> {
    if !path.exists() {
        return Err(Error::VideoProcessing(format!(
            "Failed to open video: {}",
            path.display()
        )));
    }

    let output = Command::new(ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .await
        .map_err(|e| Error::VideoProcessing(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::VideoProcessing(format!(
            "Failed to open video {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    let meta = parsed.into_meta()?;
    debug!("Probed {}: {:?}", path.display(), meta);

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_from(json: &str) -> Result<VideoMeta> {
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        probe.into_meta()
    }

    #[test]
    fn parse_rate_forms() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25"), Some(25.0));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn full_probe_with_audio() {
        let meta = meta_from(
            r#"{
                "streams": [
                    {"codec_type": "video", "width": 1920, "height": 1080,
                     "avg_frame_rate": "30/1", "r_frame_rate": "30/1", "nb_frames": "150"},
                    {"codec_type": "audio"}
                ],
                "format": {"duration": "5.000000"}
            }"#,
        )
        .unwrap();

        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.total_frames, 150);
        assert_eq!(meta.duration_sec, 5.0);
        assert!(meta.has_audio);
    }

    #[test]
    fn missing_rate_falls_back() {
        let meta = meta_from(
            r#"{
                "streams": [{"codec_type": "video", "width": 640, "height": 480,
                             "avg_frame_rate": "0/0", "r_frame_rate": "0/0"}],
                "format": {"duration": "2.0"}
            }"#,
        )
        .unwrap();

        assert_eq!(meta.fps, FALLBACK_FPS);
        assert_eq!(meta.total_frames, 60);
        assert!(!meta.has_audio);
    }

    #[test]
    fn duration_derived_from_frames() {
        let meta = meta_from(
            r#"{
                "streams": [{"codec_type": "video", "width": 640, "height": 480,
                             "avg_frame_rate": "25/1", "nb_frames": "100"}]
            }"#,
        )
        .unwrap();

        assert_eq!(meta.duration_sec, 4.0);
    }

    #[test]
    fn audio_only_is_rejected() {
        let err = meta_from(r#"{"streams": [{"codec_type": "audio"}]}"#).unwrap_err();
        assert!(err.to_string().contains("No video stream"));
    }

    #[tokio::test]
    async fn missing_file_is_video_error() {
        let err = probe(Path::new("ffprobe"), Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VideoProcessing(_)));
    }
}
