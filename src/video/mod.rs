//! Video decode, encode and audio muxing via ffmpeg subprocesses
//!
//! - [`VideoSource`] - RGB frames and metadata from an input file
//! - [`VideoSink`] - H.264 encoder fed frame by frame over stdin
//! - [`AudioMerger`] - reattaches the original audio to a silent render
//!
//! All three are implemented by [`Ffmpeg`], which shells out to the
//! `ffmpeg`/`ffprobe` binaries resolved at construction.

pub mod merge;
pub mod probe;
pub mod sink;
pub mod source;

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::Result;

pub use sink::FfmpegSink;
pub use source::FfmpegSource;

/// Video stream metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: f64,
    pub total_frames: u64,
    pub duration_sec: f64,
    /// Whether the container carries an audio stream
    pub has_audio: bool,
}

/// A decoded frame and its position in the stream
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based frame index
    pub index: u64,
    pub image: RgbImage,
}

/// Sequential reader of decoded frames
#[async_trait]
pub trait VideoSource: Send {
    fn meta(&self) -> &VideoMeta;

    /// Next frame, or `None` once the stream is exhausted
    async fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Sequential writer of frames into an output file
#[async_trait]
pub trait VideoSink: Send {
    async fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the output, returning the number of frames written.
    /// Fails if no frame was ever written.
    async fn finish(&mut self) -> Result<u64>;
}

/// Opens [`VideoSource`]s
#[async_trait]
pub trait VideoSourceFactory: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>>;
}

/// Creates [`VideoSink`]s
pub trait VideoSinkFactory: Send + Sync {
    fn create(&self, output: &Path, fps: f64) -> Box<dyn VideoSink>;
}

/// Muxes the audio of one file onto the video of another
#[async_trait]
pub trait AudioMerger: Send + Sync {
    async fn merge_audio(&self, video_no_audio: &Path, original: &Path, output: &Path) -> Result<()>;
}

/// Encoder settings for rendered output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub video_codec: String,
    pub pixel_format: String,
    pub crf: u8,
    pub preset: String,
    pub audio_codec: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

/// Locations of the ffmpeg tools plus encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub encoder: EncoderSettings,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            ffprobe_path: which::which("ffprobe").unwrap_or_else(|_| PathBuf::from("ffprobe")),
            encoder: EncoderSettings::default(),
        }
    }
}

/// ffmpeg-backed implementation of every video trait
#[derive(Debug, Clone, Default)]
pub struct Ffmpeg {
    config: FfmpegConfig,
}

impl Ffmpeg {
    #[must_use]
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    /// Check if ffmpeg and ffprobe can be executed
    pub async fn check_available(&self) -> (bool, bool) {
        let ffmpeg = tool_runs(&self.config.ffmpeg_path).await;
        let ffprobe = tool_runs(&self.config.ffprobe_path).await;
        (ffmpeg, ffprobe)
    }
}

async fn tool_runs(path: &Path) -> bool {
    Command::new(path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

#[async_trait]
impl VideoSourceFactory for Ffmpeg {
    async fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        let source = FfmpegSource::open(&self.config, path).await?;
        Ok(Box::new(source))
    }
}

impl VideoSinkFactory for Ffmpeg {
    fn create(&self, output: &Path, fps: f64) -> Box<dyn VideoSink> {
        Box::new(FfmpegSink::new(&self.config, output, fps))
    }
}

/// Shell scripts standing in for the ffmpeg tools in tests
#[cfg(all(test, unix))]
pub(crate) mod stand_in {
    use super::{EncoderSettings, FfmpegConfig};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script named `name` into `dir`
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// ffprobe that reports a single `width x height` video stream
    pub fn ffprobe(dir: &Path, width: u32, height: u32) -> PathBuf {
        let json = format!(
            r#"{{"streams": [{{"codec_type": "video", "width": {width}, "height": {height}, "avg_frame_rate": "10/1", "nb_frames": "30"}}], "format": {{"duration": "3.0"}}}}"#
        );
        script(dir, "ffprobe", &format!("cat <<'JSON'\n{json}\nJSON"))
    }

    /// Config pointing at a stand-in ffmpeg running `ffmpeg_body`
    pub fn config(dir: &Path, ffmpeg_body: &str, width: u32, height: u32) -> FfmpegConfig {
        FfmpegConfig {
            ffmpeg_path: script(dir, "ffmpeg", ffmpeg_body),
            ffprobe_path: ffprobe(dir, width, height),
            encoder: EncoderSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_encoder_settings() {
        let settings = EncoderSettings::default();
        assert_eq!(settings.video_codec, "libx264");
        assert_eq!(settings.pixel_format, "yuv420p");
        assert_eq!(settings.crf, 23);
        assert_eq!(settings.preset, "medium");
        assert_eq!(settings.audio_codec, "aac");
    }

    #[test]
    fn config_falls_back_to_bare_names() {
        let config: FfmpegConfig = toml::from_str(
            r#"
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
"#,
        )
        .unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.encoder.crf, 23);
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let ffmpeg = Ffmpeg::new(FfmpegConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            encoder: EncoderSettings::default(),
        });
        assert_eq!(ffmpeg.check_available().await, (false, false));
    }
}
