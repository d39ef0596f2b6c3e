//! Route handlers
//!
//! Uploaded files are streamed to a scoped temp path, so they are removed
//! when the handler returns or the client goes away.

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::error::ApiError;
use super::schemas::{
    HealthResponse, PresignRequest, PresignResponse, ProcessKeyRequest, ProcessVideoResponse,
    UploadResponse, DEFAULT_SCORE_THRESHOLD,
};
use super::AppState;
use crate::pipeline::ProcessVideoInput;
use crate::storage::{
    output_key, sanitized_extension, upload_key, validate_key, TempFileManager, TempPath,
};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// GET /health, GET /api/v1/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/v1/upload
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResponse> {
    let mut multipart = multipart.map_err(|e| ApiError::InvalidParameter(e.body_text()))?;
    let temp = state.process_video.temp();

    let mut received = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            received = Some(receive_file(field, temp, state.max_upload_bytes).await?);
        }
    }
    let (file, filename) =
        received.ok_or_else(|| ApiError::InvalidParameter("file is required".to_string()))?;

    let key = upload_key(&filename);
    let key = state
        .process_video
        .storage()
        .upload(file.path(), &key)
        .await?;

    info!("Stored upload {} as {}", filename, key);
    Ok(Json(UploadResponse { key }))
}

/// POST /api/v1/uploads/presign
pub async fn presign_upload(
    State(state): State<AppState>,
    payload: Result<Json<PresignRequest>, JsonRejection>,
) -> ApiResult<PresignResponse> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidParameter(e.body_text()))?;

    if !req.content_type.starts_with("video/") {
        return Err(ApiError::InvalidParameter(format!(
            "content_type must be a video type, got {:?}",
            req.content_type
        )));
    }

    let key = upload_key(&req.filename);
    let expiry = state.url_expiry();
    let upload_url = state
        .process_video
        .storage()
        .signed_upload_url(&key, &req.content_type, expiry)
        .await?;

    debug!("Issued upload URL for {}", key);
    Ok(Json(PresignResponse {
        key,
        upload_url,
        expires_in: expiry.as_secs(),
    }))
}

/// POST /api/v1/process (multipart `file`, optional `score_threshold`)
pub async fn process_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ProcessVideoResponse> {
    let mut multipart = multipart.map_err(|e| ApiError::InvalidParameter(e.body_text()))?;
    let temp = state.process_video.temp();

    let mut received = None;
    let mut score_threshold = DEFAULT_SCORE_THRESHOLD;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                received = Some(receive_file(field, temp, state.max_upload_bytes).await?);
            }
            Some("score_threshold") => {
                score_threshold = parse_threshold(&field.text().await?)?;
            }
            _ => {}
        }
    }

    let (file, filename) =
        received.ok_or_else(|| ApiError::InvalidParameter("file is required".to_string()))?;
    info!("Processing upload {} (threshold {})", filename, score_threshold);

    run(&state, file.path(), score_threshold).await
}

/// POST /api/v1/process/key
pub async fn process_key(
    State(state): State<AppState>,
    payload: Result<Json<ProcessKeyRequest>, JsonRejection>,
) -> ApiResult<ProcessVideoResponse> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidParameter(e.body_text()))?;
    validate_key(&req.key)?;
    check_threshold(req.score_threshold)?;

    let input = state.process_video.temp().scoped_temp_path(&temp_suffix(&req.key));
    state
        .process_video
        .storage()
        .download(&req.key, input.path())
        .await?;

    info!("Processing stored object {}", req.key);
    run(&state, input.path(), req.score_threshold).await
}

async fn run(
    state: &AppState,
    input_path: &Path,
    score_threshold: f32,
) -> ApiResult<ProcessVideoResponse> {
    let result = state
        .process_video
        .execute(ProcessVideoInput {
            input_path: input_path.to_path_buf(),
            output_key: output_key(Utc::now()),
            score_threshold,
        })
        .await?;

    Ok(Json(result.into()))
}

/// Stream one multipart field to a scoped temp file, enforcing `limit`
async fn receive_file<'t>(
    mut field: Field<'_>,
    temp: &'t TempFileManager,
    limit: u64,
) -> Result<(TempPath<'t>, String), ApiError> {
    let filename = field.file_name().unwrap_or("upload.mp4").to_string();
    let dest = temp.scoped_temp_path(&temp_suffix(&filename));

    let mut file = tokio::fs::File::create(dest.path()).await?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > limit {
            return Err(ApiError::FileTooLarge(format!(
                "File too large: more than {:.1}MB (maximum: {:.0}MB)",
                written as f64 / 1_048_576.0,
                limit as f64 / 1_048_576.0
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(ApiError::InvalidParameter("uploaded file is empty".to_string()));
    }

    debug!("Received {} ({} bytes) into {}", filename, written, dest.path().display());
    Ok((dest, filename))
}

/// Keep the original extension so ffprobe can sniff the container
fn temp_suffix(name: &str) -> String {
    sanitized_extension(name).map_or_else(|| ".mp4".to_string(), |ext| format!(".{ext}"))
}

fn parse_threshold(raw: &str) -> Result<f32, ApiError> {
    let value: f32 = raw.trim().parse().map_err(|_| {
        ApiError::InvalidParameter(format!("score_threshold must be a number, got {raw:?}"))
    })?;
    check_threshold(value)?;
    Ok(value)
}

fn check_threshold(value: f32) -> Result<(), ApiError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ApiError::InvalidParameter(format!(
            "score_threshold must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_parsing() {
        assert!((parse_threshold(" 0.35 ").unwrap() - 0.35).abs() < f32::EPSILON);
        assert!(matches!(parse_threshold("high"), Err(ApiError::InvalidParameter(_))));
        assert!(matches!(parse_threshold("-0.1"), Err(ApiError::InvalidParameter(_))));
        assert!(parse_threshold("1").is_ok());
    }
}
