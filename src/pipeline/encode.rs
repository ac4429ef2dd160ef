//! Image processor: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! This is the "processor" half of a model handle. Pages are rasterised at a
//! fixed DPI, which for large sheets can exceed what a local VLM accepts, so
//! the processor downsizes to `max_edge` before encoding. PNG keeps rendered
//! text crisp; JPEG artefacts around glyphs hurt OCR accuracy.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Input preprocessing for a loaded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProcessor {
    /// Longest edge, in pixels, sent to the model. Default: 2048.
    pub max_edge: u32,
    /// Images accepted in a single request. Default: 4.
    pub max_images: usize,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self {
            max_edge: 2048,
            max_images: 4,
        }
    }
}

impl ImageProcessor {
    /// Downsize (if needed) and encode a page for the model.
    pub fn prepare(&self, img: &DynamicImage) -> Result<ImageData, image::ImageError> {
        let longest = img.width().max(img.height());
        let mut buf = Vec::new();
        if longest > self.max_edge {
            let scaled = img.resize(self.max_edge, self.max_edge, FilterType::Lanczos3);
            debug!(
                "Downsized page {}x{} → {}x{}",
                img.width(),
                img.height(),
                scaled.width(),
                scaled.height()
            );
            scaled.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        } else {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }

        let b64 = STANDARD.encode(&buf);
        debug!("Encoded image → {} bytes base64", b64.len());

        Ok(ImageData::new(b64, "image/png").with_detail("high"))
    }
}
