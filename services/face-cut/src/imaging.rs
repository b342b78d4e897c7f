use crate::error::ProcessError;
use crate::geometry::BoundingBox;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImage, ImageEncoder, RgbaImage};

/// Content type of every stored face
pub const FACE_CONTENT_TYPE: &str = "image/jpeg";

/// Largest face canvas allocated for one message
const MAX_FACE_PIXELS: u64 = 64 * 1024 * 1024;

/// Decode input bytes into a `DynamicImage`.
pub fn decode_image(input: &[u8]) -> Result<DynamicImage, ProcessError> {
    image::load_from_memory(input).map_err(ProcessError::Decode)
}

/// Cut the box out of the image.
///
/// The result is always `width() x height()` of the box. Parts of the box
/// outside the photo are filled with black.
pub fn crop_face(image: &DynamicImage, bbox: &BoundingBox) -> Result<DynamicImage, ProcessError> {
    let (width, height) = match (u32::try_from(bbox.width()), u32::try_from(bbox.height())) {
        (Ok(width), Ok(height))
            if width > 0 && height > 0 && (width as u64) * (height as u64) <= MAX_FACE_PIXELS =>
        {
            (width, height)
        }
        _ => {
            return Err(ProcessError::Geometry(format!(
                "face box ({}, {}, {}, {}) has no usable size",
                bbox.left, bbox.top, bbox.right, bbox.bottom
            )))
        }
    };

    let region = match bbox.clip(image.width(), image.height()) {
        Some(region) if region.width == width && region.height == height => {
            return Ok(image.crop_imm(region.x, region.y, width, height));
        }
        Some(region) => region,
        None => return Ok(DynamicImage::ImageRgba8(RgbaImage::new(width, height))),
    };

    let mut canvas = RgbaImage::new(width, height);
    let visible = image
        .crop_imm(region.x, region.y, region.width, region.height)
        .to_rgba8();
    canvas
        .copy_from(
            &visible,
            (region.x as i64 - bbox.left) as u32,
            (region.y as i64 - bbox.top) as u32,
        )
        .map_err(|e| ProcessError::Geometry(format!("face box does not fit its canvas: {e}")))?;

    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Encode as baseline RGB JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();

    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(ProcessError::Encode)?;

    Ok(buffer)
}

/// Decode, crop and re-encode in one go
pub fn cut_face(photo: &[u8], bbox: &BoundingBox, quality: u8) -> Result<Vec<u8>, ProcessError> {
    let image = decode_image(photo)?;
    let face = crop_face(&image, bbox)?;
    encode_jpeg(&face, quality)
}
