use axum::{
    extract::{DefaultBodyLimit, Multipart},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::compress::{compress_upload, Compressed, MAX_UPLOAD_BYTES};
use crate::{error::AppError, state::AppState};

/// Multipart bodies get some headroom over the 10MB image cap.
pub(crate) const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 2 * 1024 * 1024;

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/images/compress", post(compress))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

pub(crate) struct Upload {
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Reads the `file` field of a multipart body.
pub(crate) async fn read_file_field(mp: &mut Multipart) -> Result<Upload, AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        return Ok(Upload { content_type, body });
    }
    Err(AppError::Validation("file is required".into()))
}

/// Runs the compressor off the async executor.
pub(crate) async fn compress_in_background(upload: Upload) -> Result<Compressed, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        compress_upload(upload.content_type.as_deref(), &upload.body)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("compression task")))?;
    Ok(result?)
}

#[derive(Debug, Serialize)]
pub struct CompressResponse {
    /// `None` when no configuration fit the budget.
    pub image: Option<String>,
    pub length: usize,
    pub attempts: u32,
    pub fits: bool,
}

impl From<Compressed> for CompressResponse {
    fn from(c: Compressed) -> Self {
        match c {
            Compressed::Fits { data_url, attempts } => Self {
                length: data_url.len(),
                image: Some(data_url),
                attempts,
                fits: true,
            },
            Compressed::TooLarge { length, attempts } => Self {
                image: None,
                length,
                attempts,
                fits: false,
            },
        }
    }
}

#[instrument(skip(mp))]
pub async fn compress(mut mp: Multipart) -> Result<Json<CompressResponse>, AppError> {
    let upload = read_file_field(&mut mp).await?;
    let size = upload.body.len();
    let out: CompressResponse = compress_in_background(upload).await?.into();
    if out.fits {
        info!(size, length = out.length, attempts = out.attempts, "image compressed");
    } else {
        warn!(size, length = out.length, "image did not fit after maximum compression");
    }
    Ok(Json(out))
}
