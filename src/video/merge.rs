//! Audio reattachment: copy the rendered video, re-encode the original audio

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AudioMerger, Ffmpeg};
use crate::error::{Error, Result};

impl Ffmpeg {
    fn merge_args(&self, video_no_audio: &Path, original: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
            .iter()
            .map(std::string::ToString::to_string)
            .collect();

        args.push("-i".to_string());
        args.push(video_no_audio.to_string_lossy().to_string());
        args.push("-i".to_string());
        args.push(original.to_string_lossy().to_string());

        // video from the render, first audio track from the original
        args.extend(
            ["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a"]
                .iter()
                .map(std::string::ToString::to_string),
        );
        args.push(self.config().encoder.audio_codec.clone());

        args.push(output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl AudioMerger for Ffmpeg {
    async fn merge_audio(&self, video_no_audio: &Path, original: &Path, output: &Path) -> Result<()> {
        let args = self.merge_args(video_no_audio, original, output);
        debug!("ffmpeg merge args: {:?}", args);

        let result = Command::new(&self.config().ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::VideoEncoding(format!("Audio merge failed: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::VideoEncoding(format!(
                "Audio merge failed ({}): {}",
                result.status,
                stderr.trim()
            )));
        }

        info!("Merged audio into {}", output.display());
        Ok(())
    }
}
