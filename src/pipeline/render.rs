//! PDF rasterisation: render every page of an uploaded PDF to `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! [`rasterize_upload`] moves the work onto Tokio's blocking pool so the
//! runtime keeps driving the spinner while a large document renders.

use crate::error::OcrError;
use crate::pipeline::input::{StagedPdf, Upload};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Converts a PDF on disk into an ordered list of page images.
pub trait PdfRasterizer: Send + Sync {
    /// Render every page of `path` at `dpi`, in page order.
    fn convert(&self, path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, OcrError>;
}

/// Rasteriser backed by pdfium (auto-downloaded on first use).
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    /// Cap on either rendered dimension.
    pub max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels,
        }
    }
}

impl PdfRasterizer for PdfiumRasterizer {
    fn convert(&self, path: &Path, dpi: u32) -> Result<Vec<DynamicImage>, OcrError> {
        let name = path.display().to_string();
        let conversion = |detail: String| OcrError::Conversion {
            name: name.clone(),
            detail,
        };

        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| conversion(format!("pdfium unavailable: {e}")))?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| conversion(format!("{e:?}")))?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut images = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| conversion(format!("page {}: {e:?}", idx + 1)))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}

/// Write `upload` to a temp file and rasterise it. Blocking.
///
/// The temp file is dropped before returning, so it is gone whether the
/// conversion succeeded or failed.
fn stage_and_convert(
    rasterizer: &dyn PdfRasterizer,
    upload: &Upload,
    dpi: u32,
) -> Result<Vec<DynamicImage>, OcrError> {
    let staged = StagedPdf::stage(upload)?;
    let result = rasterizer.convert(staged.path(), dpi);
    drop(staged);
    result
}

/// Stage `upload` in a temp file, rasterise it, and delete the temp file.
///
/// Staging and rendering both run on the blocking pool. The temp file is
/// owned by the blocking task, so it is removed on success, on conversion
/// error, and if the rasteriser panics.
pub async fn rasterize_upload(
    rasterizer: Arc<dyn PdfRasterizer>,
    upload: &Upload,
    dpi: u32,
) -> Result<Vec<DynamicImage>, OcrError> {
    upload.validate()?;
    let name = upload.file_name.clone();
    let upload = upload.clone();

    let pages = tokio::task::spawn_blocking(move || {
        stage_and_convert(rasterizer.as_ref(), &upload, dpi)
    })
    .await
    .map_err(|e| OcrError::Conversion {
        name: name.clone(),
        detail: format!("render task panicked: {e}"),
    })?
    .map_err(|e| match e {
        // Report the user's file name rather than the temp path.
        OcrError::Conversion { detail, .. } => OcrError::Conversion {
            name: name.clone(),
            detail,
        },
        other => other,
    })?;

    if pages.is_empty() {
        return Err(OcrError::EmptyDocument { name });
    }
    Ok(pages)
}
