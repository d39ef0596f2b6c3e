use anyhow::{bail, Result};

use poseflow::video::Ffmpeg;
use poseflow::AppConfig;

pub async fn cmd_check(config: &AppConfig) -> Result<()> {
    let ffmpeg = Ffmpeg::new(config.video.ffmpeg.clone());
    let (has_ffmpeg, has_ffprobe) = ffmpeg.check_available().await;

    let model = &config.model;
    let has_model = model.model_path.is_file();
    let can_fetch_model = model.model_url.is_some();

    let mark = |ok: bool| if ok { "✅" } else { "❌" };

    eprintln!(
        "{} ffmpeg:  {}",
        mark(has_ffmpeg),
        config.video.ffmpeg.ffmpeg_path.display()
    );
    eprintln!(
        "{} ffprobe: {}",
        mark(has_ffprobe),
        config.video.ffmpeg.ffprobe_path.display()
    );

    if has_model {
        eprintln!("✅ model:   {}", model.model_path.display());
    } else if let Some(url) = &model.model_url {
        eprintln!("⬇️  model:   {} (downloads from {url})", model.model_path.display());
    } else {
        eprintln!("❌ model:   {} (missing, no model_url)", model.model_path.display());
    }

    let storage = &config.storage.s3;
    if storage.is_configured() {
        eprintln!("✅ storage: {} / {}", storage.endpoint_url, storage.bucket);
    } else {
        eprintln!("⚠️  storage: not configured (set R2_* variables); `serve` will fail");
    }

    if !has_ffmpeg || !has_ffprobe || !(has_model || can_fetch_model) {
        bail!("required tools are missing");
    }
    Ok(())
}
