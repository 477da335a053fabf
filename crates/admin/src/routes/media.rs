//! Image upload.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use tracing::instrument;

use crate::error::AppError;
use crate::services::MediaService;
use crate::services::media::UploadedImage;
use crate::state::AppState;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// `POST /api/media` with a multipart `file` field.
#[instrument(skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedImage>), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let service = MediaService::new(state.cms(), &state.config().media);
        let image = service
            .upload(bytes.to_vec(), &content_type, filename.as_deref())
            .await?;

        tracing::info!(asset_id = %image.id, size = image.size, "Image uploaded");
        return Ok((StatusCode::CREATED, Json(image)));
    }

    Err(AppError::BadRequest(format!(
        "missing multipart field \"{FILE_FIELD}\""
    )))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}
