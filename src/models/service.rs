use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum number of images attached to a listing.
pub const MAX_IMAGES: usize = 10;
/// Maximum decoded size of a single image, 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_MIME: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// A provider's offering. `rating`, `review_count` and `booking_count` are
/// derived: the first two are recomputed on every review write, the last is
/// resynced whenever a booking completes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceListing {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub description: String,
    pub categories: Vec<String>,
    pub price_hour: Decimal,
    pub price_day: Decimal,
    /// Validated base64 data URIs.
    pub images: Vec<String>,
    pub rating: Decimal,
    pub review_count: i32,
    pub booking_count: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checks one image data URI: `data:image/<type>;base64,<payload>` with an
/// allowed MIME type and a decoded size within [`MAX_IMAGE_BYTES`]. The
/// payload itself is never decoded here; the size is derived from the base64
/// length.
pub fn validate_image_data_uri(uri: &str) -> Result<(), String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "image must be a data URI".to_string())?;

    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| "image data URI must be base64 encoded".to_string())?;

    if !ALLOWED_MIME.contains(&mime) {
        return Err(format!("unsupported image type '{mime}'"));
    }

    if payload.is_empty() {
        return Err("image payload is empty".to_string());
    }

    let padding = payload.bytes().rev().take_while(|&b| b == b'=').count();
    let decoded_len = payload.len() / 4 * 3 - padding;
    if decoded_len > MAX_IMAGE_BYTES {
        return Err(format!(
            "image exceeds {} bytes (got ~{decoded_len})",
            MAX_IMAGE_BYTES
        ));
    }

    Ok(())
}

/// Validates a full image list for a listing.
pub fn validate_images(images: &[String]) -> Result<(), String> {
    if images.len() > MAX_IMAGES {
        return Err(format!("at most {MAX_IMAGES} images are allowed"));
    }
    for (idx, image) in images.iter().enumerate() {
        validate_image_data_uri(image).map_err(|e| format!("image {idx}: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_uri(payload_len: usize) -> String {
        format!("data:image/png;base64,{}", "A".repeat(payload_len))
    }

    #[test]
    fn test_valid_data_uri() {
        assert!(validate_image_data_uri("data:image/png;base64,iVBORw0KGgo=").is_ok());
        assert!(validate_image_data_uri("data:image/webp;base64,UklGRg==").is_ok());
    }

    #[test]
    fn test_rejects_non_data_uri() {
        assert!(validate_image_data_uri("https://example.com/a.png").is_err());
        assert!(validate_image_data_uri("data:image/png,rawbytes").is_err());
    }

    #[test]
    fn test_rejects_unsupported_mime() {
        assert!(validate_image_data_uri("data:image/svg+xml;base64,PHN2Zz4=").is_err());
        assert!(validate_image_data_uri("data:text/plain;base64,aGk=").is_err());
    }

    #[test]
    fn test_rejects_oversized_payload() {
        // 5 MiB decodes from ~6.99M base64 chars; one block over the limit fails.
        let over = (MAX_IMAGE_BYTES / 3 + 1) * 4;
        assert!(validate_image_data_uri(&png_uri(over)).is_err());
        assert!(validate_image_data_uri(&png_uri(1024)).is_ok());
    }

    #[test]
    fn test_image_count_limit() {
        let ten: Vec<String> = (0..MAX_IMAGES).map(|_| png_uri(16)).collect();
        assert!(validate_images(&ten).is_ok());

        let eleven: Vec<String> = (0..MAX_IMAGES + 1).map(|_| png_uri(16)).collect();
        assert!(validate_images(&eleven).is_err());
    }

    #[test]
    fn test_image_error_names_offending_index() {
        let images = vec![png_uri(16), "not-a-uri".to_string()];
        let err = validate_images(&images).unwrap_err();
        assert!(err.starts_with("image 1:"));
    }
}
