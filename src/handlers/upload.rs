// src/handlers/upload.rs
// DOCUMENTATION: Multipart form parsing for image uploads
// PURPOSE: Turn a multipart/form-data body into an ImageForm, enforcing the
// upload size limit while streaming

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;

use crate::errors::ImageServiceError;
use crate::models::{ImageForm, UploadedFile};

fn malformed(err: impl std::fmt::Display) -> ImageServiceError {
    ImageServiceError::InvalidInput(format!("Malformed multipart body: {}", err))
}

/// Read one field into memory, charging its size against `remaining`
async fn read_field(
    field: &mut Field,
    remaining: &mut usize,
    limit: usize,
) -> Result<Vec<u8>, ImageServiceError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        if chunk.len() > *remaining {
            return Err(ImageServiceError::InvalidInput(format!(
                "Upload exceeds the limit of {} bytes",
                limit
            )));
        }
        *remaining -= chunk.len();
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn text(name: &str, bytes: Vec<u8>) -> Result<String, ImageServiceError> {
    String::from_utf8(bytes)
        .map_err(|_| ImageServiceError::InvalidInput(format!("{} must be valid UTF-8", name)))
}

fn parse_id(name: &str, raw: &str) -> Result<i32, ImageServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ImageServiceError::InvalidInput(format!("{} must be an integer", name)))
}

/// `categoryIds` may be repeated and each value may hold a comma separated list
fn push_category_ids(target: &mut Vec<i32>, raw: &str) -> Result<(), ImageServiceError> {
    for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
        target.push(parse_id("categoryIds", part)?);
    }
    Ok(())
}

/// Parse the image form
/// DOCUMENTATION: Fields: file, description, userId, categoryIds. Unknown
/// fields are drained and ignored; `limit` caps the whole body.
pub async fn read_image_form(
    mut payload: Multipart,
    limit: usize,
) -> Result<ImageForm, ImageServiceError> {
    let mut form = ImageForm::default();
    let mut remaining = limit;

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = read_field(&mut field, &mut remaining, limit).await?;

        match name.as_str() {
            "file" => {
                form.file = Some(UploadedFile {
                    content_type: content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    bytes,
                });
            }
            "description" => {
                form.description = Some(text(&name, bytes)?);
            }
            "userId" => {
                let raw = text(&name, bytes)?;
                if !raw.trim().is_empty() {
                    form.user_id = Some(parse_id(&name, &raw)?);
                }
            }
            "categoryIds" | "categoryIds[]" => {
                let raw = text(&name, bytes)?;
                push_category_ids(&mut form.category_ids, &raw)?;
            }
            other => log::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ids_comma_separated() {
        let mut ids = vec![1];
        push_category_ids(&mut ids, "2, 3,,4").unwrap();

        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_category_ids_rejects_garbage() {
        let mut ids = Vec::new();

        assert!(matches!(
            push_category_ids(&mut ids, "2,abc"),
            Err(ImageServiceError::InvalidInput(_))
        ));
    }
}
