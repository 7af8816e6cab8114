//! Image normalization for the vision backend.
//!
//! Every image, whether a sampled video frame or a standalone file, goes
//! through [`ImageNormalizer::normalize`]: it is shrunk to fit the backend's
//! size limit, encoded as PNG and base64, and tagged with a token estimate.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use tracing::debug;

use framesight_models::NormalizedImage;

use crate::error::{MediaError, MediaResult};

/// Largest width and height accepted by the backend without downscaling.
pub const DEFAULT_MAX_IMAGE_SIZE: u32 = 1568;

/// Pixels per estimated token.
const PIXELS_PER_TOKEN: u64 = 750;

const PNG_MEDIA_TYPE: &str = "image/png";

/// Estimate the token cost of an image from its pixel area.
pub fn estimate_image_tokens(width: u32, height: u32) -> u64 {
    (width as u64 * height as u64) / PIXELS_PER_TOKEN
}

/// Resizes and encodes images into [`NormalizedImage`] payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageNormalizer {
    max_width: u32,
    max_height: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_SIZE, DEFAULT_MAX_IMAGE_SIZE)
    }
}

impl ImageNormalizer {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
        }
    }

    pub fn max_size(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Normalize a decoded image.
    pub fn normalize(&self, image: DynamicImage) -> MediaResult<NormalizedImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MediaError::image_processing(format!(
                "image has zero dimension ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let image = self.fit(encodable(image));
        let (width, height) = (image.width(), image.height());
        let estimated_tokens = estimate_image_tokens(width, height);
        debug!(width, height, estimated_tokens, "Estimated tokens for image");

        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageOutputFormat::Png)?;

        Ok(NormalizedImage {
            data: STANDARD.encode(buffer.into_inner()),
            media_type: PNG_MEDIA_TYPE.to_string(),
            width,
            height,
            estimated_tokens,
        })
    }

    /// Normalize a packed RGB frame.
    pub fn normalize_rgb(&self, frame: RgbImage) -> MediaResult<NormalizedImage> {
        self.normalize(DynamicImage::ImageRgb8(frame))
    }

    /// Decode an encoded image (PNG, JPEG, GIF, WebP, ...) and normalize it.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> MediaResult<NormalizedImage> {
        let image = image::load_from_memory(bytes)?;
        self.normalize(image)
    }

    /// Shrink preserving aspect ratio when either side exceeds the limit.
    fn fit(&self, image: DynamicImage) -> DynamicImage {
        if image.width() > self.max_width || image.height() > self.max_height {
            image.resize(self.max_width, self.max_height, FilterType::Lanczos3)
        } else {
            image
        }
    }
}

/// PNG cannot carry float samples; widen those to 8-bit RGBA.
fn encodable(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(image.to_rgba8())
        }
        other => other,
    }
}
