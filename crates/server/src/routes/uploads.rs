use axum::extract::Multipart;

use crate::error::ApiError;

const FILE_FIELD: &str = "file";

/// Request body cap for upload routes; the configured per-file limit is
/// enforced when storing.
pub const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Image payload pulled out of a multipart form.
pub struct ImagePart {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Reads the `file` field of a multipart form. Other fields are ignored.
pub async fn read_image_part(mut multipart: Multipart) -> Result<ImagePart, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field.bytes().await?.to_vec();
        return Ok(ImagePart {
            content_type,
            bytes,
        });
    }
    Err(ApiError::BadRequest(
        "Multipart form is missing a 'file' field".to_string(),
    ))
}
