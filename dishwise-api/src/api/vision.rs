//! Menu-photo text detection handler
//!
//! Accepts a multipart upload, validates type and size, and runs Google
//! Vision text detection. This route sits outside the enrichment pipeline;
//! it answers synchronously.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::vision::VisionError;
use crate::AppState;

/// Maximum accepted image size in bytes (5 MB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Content types accepted for menu photos
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Filename extensions accepted for menu photos
const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

/// POST /api/v1/detect_text response
#[derive(Debug, Serialize)]
pub struct DetectTextResponse {
    pub status: &'static str,
    pub data: Vec<String>,
}

/// POST /api/v1/detect_text
pub async fn detect_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectTextResponse>> {
    let Some(vision) = state.vision.clone() else {
        return Err(ApiError::Unavailable(
            "Text detection is not configured".to_string(),
        ));
    };

    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("image_file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {}", e)))?;
            upload = Some((filename, content_type, data.to_vec()));
        }
    }

    let Some((filename, content_type, data)) = upload else {
        return Err(ApiError::BadRequest(
            "Must provide an image file in the image_file field".to_string(),
        ));
    };

    validate_upload(&filename, &content_type, data.len())?;

    let lines = vision.detect_text(&data).await.map_err(|e| match e {
        VisionError::Transport(msg) | VisionError::Api(msg) => ApiError::BadGateway(msg),
        VisionError::Parse(msg) => ApiError::Internal(msg),
    })?;

    info!(%filename, line_count = lines.len(), "Menu text detected");

    Ok(Json(DetectTextResponse {
        status: "ok",
        data: lines,
    }))
}

fn validate_upload(filename: &str, content_type: &str, size: usize) -> ApiResult<()> {
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(ApiError::BadRequest(
            "Image must be a JPG, JPEG, or PNG image".to_string(),
        ));
    }

    let lowered = filename.to_lowercase();
    if !ALLOWED_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) {
        return Err(ApiError::BadRequest(
            "Image must have a valid image extension".to_string(),
        ));
    }

    if size > MAX_IMAGE_BYTES {
        return Err(ApiError::BadRequest(
            "Image must be smaller than 5MB".to_string(),
        ));
    }

    Ok(())
}

/// Build text-detection routes
pub fn detect_text_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/detect_text", post(detect_text))
        // Multipart bodies carry the image plus framing overhead
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_jpeg_and_png_uploads() {
        assert!(validate_upload("menu.jpg", "image/jpeg", 1024).is_ok());
        assert!(validate_upload("menu.JPEG", "image/jpeg", 1024).is_ok());
        assert!(validate_upload("menu.png", "image/png", 1024).is_ok());
    }

    #[test]
    fn rejects_unsupported_content_types() {
        assert!(validate_upload("menu.gif", "image/gif", 1024).is_err());
        assert!(validate_upload("menu.pdf", "application/pdf", 1024).is_err());
    }

    #[test]
    fn rejects_mismatched_extensions() {
        assert!(validate_upload("menu.txt", "image/jpeg", 1024).is_err());
        assert!(validate_upload("menu", "image/png", 1024).is_err());
    }

    #[test]
    fn rejects_oversized_images() {
        assert!(validate_upload("menu.jpg", "image/jpeg", MAX_IMAGE_BYTES + 1).is_err());
        assert!(validate_upload("menu.jpg", "image/jpeg", MAX_IMAGE_BYTES).is_ok());
    }
}
