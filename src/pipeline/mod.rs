//! Pipeline stages behind a single OCR request.
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm
//! (upload)  (pdfium)   (PNG)      (VLM)
//! ```
//!
//! 1. [`input`] : validate the upload and stage it in a scoped temp file
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking`
//! 3. [`encode`]: the model's image processor (downsize + base64 PNG)
//! 4. [`llm`]   : model loading and generation behind traits

pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
