//! Error types for the edgequake-ocr-session library.
//!
//! Every session action (upload, page change, model load, extraction, save)
//! reports failure through a single [`OcrError`]. Errors are scoped to the
//! action that raised them: the controller hands back the session snapshot
//! that should be shown next, so a failed extraction never wipes the loaded
//! model and a failed upload never drops the previous document.
//!
//! [`ErrorKind`] groups the variants into the coarse categories the user
//! interface cares about:
//!
//! | Kind | Raised by |
//! |------|-----------|
//! | `Conversion` | bad upload, corrupt PDF, rasterisation, download |
//! | `ModelLoad`  | provider/loader failure, extract without a ready model |
//! | `Inference`  | prompt formatting or generation failure |
//! | `Input`      | page out of range, no document, invalid config |
//! | `Output`     | writing the download artifact |

use std::path::PathBuf;
use thiserror::Error;

/// Coarse error category, used by the presentation layer to pick wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Conversion,
    ModelLoad,
    Inference,
    Input,
    Output,
}

/// All errors returned by session actions.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Conversion errors ─────────────────────────────────────────────────
    /// The uploaded file is not PDF-typed (wrong extension or magic bytes).
    #[error("'{name}' is not a PDF file (first bytes: {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// The PDF could not be opened or rasterised.
    #[error("Error processing PDF '{name}': {detail}")]
    Conversion { name: String, detail: String },

    /// The PDF opened fine but contains no pages.
    #[error("PDF '{name}' has no pages")]
    EmptyDocument { name: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The loader could not produce a handle for the identifier.
    #[error(
        "Failed to load model '{identifier}': {detail}\n\
Make sure the model is available. You may need to download it first."
    )]
    ModelLoad { identifier: String, detail: String },

    /// Extraction was requested but no model matching the selection is ready.
    #[error("Model '{selected}' is not loaded. Load it before extracting text.")]
    ModelNotReady { selected: String },

    // ── Inference errors ──────────────────────────────────────────────────
    /// Prompt formatting or generation failed.
    #[error("Error during OCR: {detail}")]
    Inference { detail: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// An action needed a document but none has been uploaded.
    #[error("No PDF loaded. Upload a PDF file to begin.")]
    NoDocument,

    /// Selected page number is outside 1..=total.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write the download artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OcrError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::NotAPdf { .. }
            | OcrError::FileNotFound { .. }
            | OcrError::DownloadFailed { .. }
            | OcrError::Conversion { .. }
            | OcrError::EmptyDocument { .. } => ErrorKind::Conversion,
            OcrError::ModelLoad { .. } | OcrError::ModelNotReady { .. } => ErrorKind::ModelLoad,
            OcrError::Inference { .. } => ErrorKind::Inference,
            OcrError::NoDocument
            | OcrError::PageOutOfRange { .. }
            | OcrError::InvalidConfig(_) => ErrorKind::Input,
            OcrError::OutputWriteFailed { .. } => ErrorKind::Output,
        }
    }

    pub(crate) fn inference(detail: impl Into<String>) -> Self {
        OcrError::Inference {
            detail: detail.into(),
        }
    }
}
