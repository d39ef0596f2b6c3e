use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use poseflow::pipeline::ProcessVideoInput;
use poseflow::storage::LocalStorage;
use poseflow::AppConfig;

use super::build_use_case;

pub async fn cmd_process(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    score_threshold: f32,
) -> Result<()> {
    if !input.is_file() {
        bail!("input file not found: {}", input.display());
    }
    if !(0.0..=1.0).contains(&score_threshold) {
        bail!("--score-threshold must be between 0.0 and 1.0, got {score_threshold}");
    }

    // The output directory acts as the bucket and the file name as the key
    let out_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let key = output
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("output path has no file name: {}", output.display()))?;

    let storage = LocalStorage::new(out_dir)
        .with_context(|| format!("cannot write to {}", out_dir.display()))?;

    eprintln!("🎬 Processing: {}", input.display());
    let use_case = build_use_case(config, Arc::new(storage)).await?;

    let result = use_case
        .execute(ProcessVideoInput {
            input_path: input.to_path_buf(),
            output_key: key.to_string(),
            score_threshold,
        })
        .await?;

    let meta = &result.video_meta;
    eprintln!(
        "   {}x{} @ {:.2} fps, {:.1}s, audio: {}",
        meta.width,
        meta.height,
        meta.fps,
        meta.duration_sec,
        if meta.has_audio { "yes" } else { "no" }
    );
    eprintln!(
        "✅ {} poses in {:.1}s → {}",
        result.total_poses,
        result.processing_time_sec,
        output.display()
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
