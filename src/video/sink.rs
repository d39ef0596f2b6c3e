//! Frame encoding: raw `rgb24` frames piped into an ffmpeg H.264 encoder

use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::source::collect_stderr;
use super::{EncoderSettings, FfmpegConfig, VideoSink};
use crate::error::{Error, Result};

struct Encoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: JoinHandle<String>,
    width: u32,
    height: u32,
}

/// Writes frames to a video file; the encoder starts on the first frame
pub struct FfmpegSink {
    ffmpeg_path: PathBuf,
    encoder_settings: EncoderSettings,
    output: PathBuf,
    fps: f64,
    encoder: Option<Encoder>,
    frames_written: u64,
}

impl FfmpegSink {
    #[must_use]
    pub fn new(config: &FfmpegConfig, output: &Path, fps: f64) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            encoder_settings: config.encoder.clone(),
            output: output.to_path_buf(),
            fps,
            encoder: None,
            frames_written: 0,
        }
    }

    /// Build ffmpeg arguments for a `width × height` stream
    fn build_args(&self, width: u32, height: u32) -> Vec<String> {
        let enc = &self.encoder_settings;
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        // Raw frames on stdin
        args.extend([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{width}x{height}"),
            "-r".to_string(),
            format!("{}", self.fps),
            "-i".to_string(),
            "pipe:0".to_string(),
        ]);

        args.push("-an".to_string());

        // yuv420p needs even dimensions
        if width % 2 != 0 || height % 2 != 0 {
            args.push("-vf".to_string());
            args.push("scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string());
        }

        args.extend([
            "-c:v".to_string(),
            enc.video_codec.clone(),
            "-pix_fmt".to_string(),
            enc.pixel_format.clone(),
            "-crf".to_string(),
            enc.crf.to_string(),
            "-preset".to_string(),
            enc.preset.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);

        args.push(self.output.to_string_lossy().to_string());
        args
    }

    fn start(&self, width: u32, height: u32) -> Result<Encoder> {
        let args = self.build_args(width, height);
        debug!("ffmpeg encoder args: {:?}", args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::VideoEncoding(format!("failed to start ffmpeg encoder: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::VideoEncoding("Failed to capture ffmpeg stdin".to_string()))?;
        let stderr = collect_stderr(child.stderr.take());

        Ok(Encoder {
            child,
            stdin: Some(stdin),
            stderr,
            width,
            height,
        })
    }
}

#[async_trait]
impl VideoSink for FfmpegSink {
    async fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = frame.dimensions();

        if self.encoder.is_none() {
            self.encoder = Some(self.start(width, height)?);
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(Error::VideoEncoding("encoder not running".to_string()));
        };

        if (width, height) != (encoder.width, encoder.height) {
            return Err(Error::VideoEncoding(format!(
                "frame size {width}x{height} differs from stream size {}x{}",
                encoder.width, encoder.height
            )));
        }

        let stdin = encoder
            .stdin
            .as_mut()
            .ok_or_else(|| Error::VideoEncoding("encoder input already closed".to_string()))?;

        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| Error::VideoEncoding(format!("failed to write frame to ffmpeg: {e}")))?;

        self.frames_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        let Some(mut encoder) = self.encoder.take() else {
            return Err(Error::VideoProcessing(
                "No frames to write: empty frame sequence provided".to_string(),
            ));
        };

        if let Some(mut stdin) = encoder.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                warn!("Failed to close ffmpeg stdin: {}", e);
            }
        }

        let status = encoder.child.wait().await?;
        let stderr = encoder.stderr.await.unwrap_or_default();

        if !status.success() {
            return Err(Error::VideoEncoding(format!(
                "ffmpeg encoder exited with {status}: {}",
                stderr.trim()
            )));
        }

        info!(
            "Encoded {} frames to {}",
            self.frames_written,
            self.output.display()
        );
        Ok(self.frames_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> FfmpegSink {
        FfmpegSink::new(&FfmpegConfig::default(), Path::new("/tmp/out.mp4"), 29.97)
    }

    #[test]
    fn build_args_even_size() {
        let args = sink().build_args(1280, 720);

        assert!(args.contains(&"1280x720".to_string()));
        assert!(args.contains(&"29.97".to_string()));
        assert!(args.contains(&"pipe:0".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(!args.contains(&"-vf".to_string()));
        assert_eq!(args.last(), Some(&"/tmp/out.mp4".to_string()));
    }

    #[test]
    fn build_args_odd_size_rounds_down() {
        let args = sink().build_args(641, 480);
        assert!(args.contains(&"-vf".to_string()));
    }

    #[test]
    fn build_args_uses_crf_and_preset() {
        let args = sink().build_args(640, 480);
        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], "23");
        let preset = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset + 1], "medium");
    }

    #[tokio::test]
    async fn finish_without_frames_fails() {
        let err = sink().finish().await.unwrap_err();
        assert!(err.to_string().contains("No frames to write"));
    }

    #[cfg(unix)]
    fn stand_in_sink(dir: &tempfile::TempDir, ffmpeg_body: &str) -> FfmpegSink {
        let config = crate::video::stand_in::config(dir.path(), ffmpeg_body, 4, 4);
        FfmpegSink::new(&config, &dir.path().join("out.mp4"), 10.0)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn counts_frames_on_clean_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = stand_in_sink(&dir, "cat > /dev/null");
        sink.write_frame(&RgbImage::new(4, 4)).await.unwrap();
        sink.write_frame(&RgbImage::new(4, 4)).await.unwrap();
        assert_eq!(sink.finish().await.unwrap(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejects_frame_of_different_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = stand_in_sink(&dir, "cat > /dev/null");
        sink.write_frame(&RgbImage::new(4, 4)).await.unwrap();

        let err = sink.write_frame(&RgbImage::new(6, 4)).await.unwrap_err();
        assert!(matches!(err, Error::VideoEncoding(_)));
        assert!(err
            .to_string()
            .contains("frame size 6x4 differs from stream size 4x4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn encoder_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = stand_in_sink(&dir, "cat > /dev/null\necho 'Error encoding' >&2\nexit 1");
        sink.write_frame(&RgbImage::new(4, 4)).await.unwrap();

        let err = sink.finish().await.unwrap_err();
        assert!(matches!(err, Error::VideoEncoding(_)));
        let message = err.to_string();
        assert!(message.contains("ffmpeg encoder exited with"), "{message}");
        assert!(message.contains("Error encoding"), "{message}");
    }

    #[tokio::test]
    async fn missing_binary_fails_on_first_frame() {
        let config = FfmpegConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ..FfmpegConfig::default()
        };
        let mut sink = FfmpegSink::new(&config, Path::new("/tmp/out.mp4"), 30.0);
        let err = sink.write_frame(&RgbImage::new(4, 4)).await.unwrap_err();
        assert!(matches!(err, Error::VideoEncoding(_)));
    }
}
