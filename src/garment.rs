use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::CampaignError;

/// A validated garment upload, ready to be sent inline to the prompt writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarmentImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl GarmentImage {
    /// Accepts JPEG, PNG and WebP uploads that actually decode.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, CampaignError> {
        if bytes.is_empty() {
            return Err(CampaignError::invalid("garment image is empty"));
        }
        let format = image::guess_format(&bytes).map_err(|e| {
            CampaignError::invalid(format!("garment image format not recognised: {e}"))
        })?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
            return Err(CampaignError::invalid(format!(
                "garment image must be jpg, png or webp (got {format:?})"
            )));
        }
        let img = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| CampaignError::invalid(format!("garment image does not decode: {e}")))?;
        Ok(Self {
            mime_type: format.to_mime_type().to_string(),
            width: img.width(),
            height: img.height(),
            bytes,
        })
    }

    /// Downsizes uploads whose longest edge exceeds `max_edge`, re-encoding as JPEG.
    /// Smaller images are returned untouched.
    pub fn fit_within(self, max_edge: u32) -> Result<Self, CampaignError> {
        if max_edge == 0 || self.width.max(self.height) <= max_edge {
            return Ok(self);
        }
        let img = image::load_from_memory(&self.bytes)
            .map_err(|e| CampaignError::invalid(format!("garment image does not decode: {e}")))?;
        let resized = img.resize(max_edge, max_edge, FilterType::Lanczos3);
        let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
        let mut buf = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(|e| CampaignError::invalid(format!("garment image re-encode failed: {e}")))?;
        tracing::debug!(
            from_w = self.width,
            from_h = self.height,
            to_w = rgb.width(),
            to_h = rgb.height(),
            "garment downsized"
        );
        Ok(Self {
            bytes: buf,
            mime_type: ImageFormat::Jpeg.to_mime_type().to_string(),
            width: rgb.width(),
            height: rgb.height(),
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_png(w: u32, h: u32) -> Vec<u8> {
    let img =
        image::RgbImage::from_fn(w, h, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}
