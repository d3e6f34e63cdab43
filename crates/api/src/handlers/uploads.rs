//! Handler for `/uploads`: images the editor places with `image`
//! modifications.

use std::path::PathBuf;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use image::ImageFormat;
use navlens_core::auth::SignedRequest;
use serde::Serialize;

use super::{authorize_request, timestamp_from_str};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::OptionalSession;
use crate::response::DataResponse;
use crate::state::AppState;

/// Formats accepted for upload, detected from the file content.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// Request body allowance on top of the file itself for multipart framing
/// and the authorization fields.
pub const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Detect the image format of `data`, or `None` if it is not an accepted one.
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data)
        .ok()
        .filter(|format| ALLOWED_FORMATS.contains(format))
}

fn extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        _ => "png",
    }
}

/// POST /api/v1/uploads
///
/// Multipart form with a required `file` field plus the authorization fields
/// `experimentId`, `siteId`, `variantId`, `timestamp` and `signature`.
pub async fn upload(
    State(state): State<AppState>,
    session: OptionalSession,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadResponse>>)> {
    let mut file: Option<Vec<u8>> = None;
    let mut request = SignedRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            file = Some(data.to_vec());
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "experimentId" => request.experiment_id = Some(text),
            "siteId" => request.site_id = Some(text),
            "variantId" => request.variant_id = Some(text),
            "timestamp" => request.timestamp = timestamp_from_str(&text),
            "signature" => request.signature = Some(text),
            _ => {} // ignore unknown fields
        }
    }

    let request = request.trimmed();
    authorize_request(&state, session.identity(), &request).await?;

    let data = file.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    if data.len() > state.config.max_upload_bytes {
        return Err(AppError::BadRequest(format!(
            "File exceeds the maximum upload size of {} bytes",
            state.config.max_upload_bytes
        )));
    }
    let format = detect_format(&data).ok_or_else(|| {
        AppError::BadRequest("Unsupported image format. Supported: png, jpeg, webp, gif".into())
    })?;

    let storage_dir = PathBuf::from(&state.config.upload_dir);
    tokio::fs::create_dir_all(&storage_dir)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let stored_filename = format!("{}.{}", uuid::Uuid::now_v7(), extension(format));
    tokio::fs::write(storage_dir.join(&stored_filename), &data)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::info!(
        variant_id = ?request.variant_id,
        file = %stored_filename,
        bytes = data.len(),
        "Stored upload"
    );

    let url = format!("{}/uploads/{stored_filename}", state.config.public_base_url);
    Ok((StatusCode::CREATED, Json(DataResponse { data: UploadResponse { url } })))
}
