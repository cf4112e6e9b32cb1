use crate::errors::ConsignError;
use image::{GenericImageView, ImageFormat};
use std::path::Path;

/// Largest accepted source image, in pixels per side.
const MAX_SOURCE_DIMENSION: u32 = 4096;

pub struct ImageProcessor {
    max_dimension: u32,
}

impl ImageProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), ConsignError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ConsignError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        let (width, height) = img.dimensions();

        if width > MAX_SOURCE_DIMENSION || height > MAX_SOURCE_DIMENSION {
            return Err(ConsignError::ImageProcessing(format!(
                "Image dimensions exceed {0}x{0}",
                MAX_SOURCE_DIMENSION
            )));
        }

        Ok((width, height))
    }

    /// Downscales oversized images, keeping the source encoding where the
    /// encoder supports it and falling back to JPEG otherwise.
    pub fn resize_if_needed(&self, data: &[u8]) -> Result<Vec<u8>, ConsignError> {
        let img = image::load_from_memory(data)
            .map_err(|e| ConsignError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let (width, height) = img.dimensions();
        let max_size = self.max_dimension;

        if width <= max_size && height <= max_size {
            return Ok(data.to_vec());
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let format = match image::guess_format(data) {
            Ok(f @ (ImageFormat::Png | ImageFormat::Jpeg)) => f,
            _ => ImageFormat::Jpeg,
        };

        // JPEG has no alpha channel
        let resized = if format == ImageFormat::Jpeg {
            image::DynamicImage::ImageRgb8(resized.to_rgb8())
        } else {
            resized
        };

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), format)
            .map_err(|e| {
                ConsignError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(output)
    }
}

/// MIME type for an uploaded file, inferred from its extension.
pub fn content_type_for(filename: Option<&str>) -> &'static str {
    let format = filename.and_then(|name| ImageFormat::from_path(Path::new(name)).ok());

    match format {
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::Gif) => "image/gif",
        Some(ImageFormat::WebP) => "image/webp",
        Some(ImageFormat::Bmp) => "image/bmp",
        Some(ImageFormat::Tiff) => "image/tiff",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
