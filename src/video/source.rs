//! Frame decoding: ffmpeg writes raw `rgb24` frames to a pipe

use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::probe::probe;
use super::{FfmpegConfig, Frame, VideoMeta, VideoSource};
use crate::error::{Error, Result};

/// Keep this many trailing stderr lines for error messages
const STDERR_TAIL: usize = 20;

/// Spawn a task that logs ffmpeg's stderr and returns its last lines
pub(crate) fn collect_stderr(stderr: Option<tokio::process::ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let Some(stderr) = stderr else {
            return String::new();
        };
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = std::collections::VecDeque::with_capacity(STDERR_TAIL);
        while let Ok(Some(line)) = lines.next_line().await {
            if line.contains("Error") || line.contains("error") {
                warn!("ffmpeg: {}", line);
            } else {
                debug!("ffmpeg: {}", line);
            }
            if tail.len() == STDERR_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}

/// Decodes a video file into RGB frames
pub struct FfmpegSource {
    meta: VideoMeta,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    frame_size: usize,
    next_index: u64,
    finished: bool,
}

impl FfmpegSource {
    /// Probe `path` and start the decoder
    pub async fn open(config: &FfmpegConfig, path: &Path) -> Result<Self> {
        let meta = probe(&config.ffprobe_path, path).await?;

        let mut child = Command::new(&config.ffmpeg_path)
            // frame size must match the probed stream, so skip display rotation
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::VideoProcessing(format!("failed to start ffmpeg decoder: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::VideoProcessing("Failed to capture ffmpeg stdout".to_string()))?;
        let stderr = collect_stderr(child.stderr.take());

        let frame_size = meta.width as usize * meta.height as usize * 3;
        debug!(
            "Decoding {} ({}x{} @ {:.2} fps)",
            path.display(),
            meta.width,
            meta.height,
            meta.fps
        );

        Ok(Self {
            meta,
            child,
            stdout: BufReader::with_capacity(frame_size.max(8192), stdout),
            stderr: Some(stderr),
            frame_size,
            next_index: 0,
            finished: false,
        })
    }

    /// Fill `buf` from the pipe; returns the number of bytes read before EOF
    async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Reap the decoder and surface a non-zero exit
    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(Error::VideoProcessing(format!(
                "ffmpeg decoder exited with {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoSource for FfmpegSource {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_size];
        let filled = self.read_full(&mut buf).await?;

        if filled < self.frame_size {
            if filled > 0 {
                warn!(
                    "Discarding truncated trailing frame ({} of {} bytes)",
                    filled, self.frame_size
                );
            }
            self.finish().await?;
            debug!("Decoded {} frames", self.next_index);
            return Ok(None);
        }

        let image = RgbImage::from_raw(self.meta.width, self.meta.height, buf)
            .ok_or_else(|| Error::VideoProcessing("frame buffer size mismatch".to_string()))?;

        let index = self.next_index;
        self.next_index += 1;

        Ok(Some(Frame { index, image }))
    }
}
