use std::io::Cursor;

use image::{GenericImageView, ImageFormat};

/// Bounding box for generated thumbnails.
pub const THUMBNAIL_MAX_DIM: u32 = 128;

/// Derive a thumbnail from original image bytes.
///
/// Output is always JPEG inside a 128x128 bounding box, preserving aspect
/// ratio. Deterministic for a given input, so re-running a redelivered job
/// overwrites the thumbnail with identical bytes.
pub fn derive(original: &[u8]) -> Result<Vec<u8>, ThumbnailError> {
    let decoded = image::load_from_memory(original).map_err(ThumbnailError::Decode)?;

    // `thumbnail` scales up as well as down; originals already inside the
    // box are kept at their native size.
    let (width, height) = decoded.dimensions();
    let thumbnail = if width <= THUMBNAIL_MAX_DIM && height <= THUMBNAIL_MAX_DIM {
        decoded
    } else {
        decoded.thumbnail(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM)
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = image::DynamicImage::ImageRgb8(thumbnail.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)
        .map_err(ThumbnailError::Encode)?;
    Ok(out.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    /// The payload is not a decodable image. Permanent: retrying the job
    /// cannot succeed, so it terminates through the delivery budget.
    #[error("Unsupported or corrupt image payload: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Thumbnail encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}
