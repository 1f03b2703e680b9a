/// Multipart image handling shared by register and the image update routes

use actix_multipart::form::tempfile::TempFile;

use crate::error::{AppError, ValidationError};
use crate::media_client::{upload_temp_file, MediaClient, UploadedMedia};

/// Take a required image upload out of a multipart field
///
/// Missing and zero-byte files both count as "not provided".
pub fn require_image(
    file: Option<TempFile>,
    field: &str,
    max_bytes: usize,
) -> Result<TempFile, ValidationError> {
    optional_image(file, field, max_bytes)?
        .ok_or_else(|| ValidationError::EmptyField(field.to_string()))
}

/// An optional image upload; present files must be `image/*` and at most
/// `max_bytes` long
pub fn optional_image(
    file: Option<TempFile>,
    field: &str,
    max_bytes: usize,
) -> Result<Option<TempFile>, ValidationError> {
    match file {
        Some(file) if file.size > 0 => {
            check_size(file.size, field, max_bytes)?;
            if is_image(&file) {
                Ok(Some(file))
            } else {
                Err(ValidationError::Invalid(format!("{} must be an image", field)))
            }
        }
        _ => Ok(None),
    }
}

fn check_size(size: usize, field: &str, max_bytes: usize) -> Result<(), ValidationError> {
    if size > max_bytes {
        return Err(ValidationError::Invalid(format!(
            "{} is too large (maximum {} bytes)",
            field, max_bytes
        )));
    }
    Ok(())
}

fn is_image(file: &TempFile) -> bool {
    file.content_type
        .as_ref()
        .map_or(false, |mime| mime.type_().as_str() == "image")
}

/// Upload a spooled image; the local temp file is gone afterwards either way
pub async fn upload_image(media: &MediaClient, file: TempFile) -> Result<UploadedMedia, AppError> {
    Ok(upload_temp_file(media, file).await?)
}

/// Best-effort removal of assets that will never be referenced
pub async fn discard_uploads(media: &MediaClient, uploads: &[&UploadedMedia]) {
    for upload in uploads {
        if let Err(e) = media.destroy(&upload.public_id).await {
            tracing::warn!(public_id = %upload.public_id, "Failed to discard orphaned upload: {}", e);
        }
    }
}

/// Best-effort removal of an image that was just replaced
pub async fn discard_replaced(media: &MediaClient, old_public_id: Option<String>, new_public_id: &str) {
    if let Some(old) = old_public_id.filter(|old| old != new_public_id) {
        if let Err(e) = media.destroy(&old).await {
            tracing::warn!(public_id = %old, "Failed to delete replaced image: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_is_inclusive() {
        assert!(check_size(1024, "avatar", 1024).is_ok());
        assert!(check_size(1, "avatar", 1024).is_ok());
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let err = check_size(2 * 1024 + 1, "avatar", 2 * 1024).unwrap_err();
        assert_eq!(err.to_string(), "avatar is too large (maximum 2048 bytes)");
    }
}
