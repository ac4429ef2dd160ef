//! # edgequake-ocr-session
//!
//! Interactive single-page PDF OCR with a local Vision Language Model (VLM).
//!
//! A session walks one user through: upload a PDF, pick a page, load a model,
//! extract the page's text as Markdown, then view or save it. All heavy
//! lifting is delegated: pdfium rasterises pages and an edgequake-llm
//! provider (Ollama, LM Studio, …) serves the model. This crate owns the
//! sequencing and the session state between those calls.
//!
//! ## Flow
//!
//! ```text
//! upload ──▶ page images ──▶ select page ──▶ load model ──▶ extract ──▶ view / save
//!            (pdfium, 200 DPI)              (by identifier)  (VLM)      ocr_page_<N>.txt
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr_session::{SessionConfig, SessionController, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = SessionController::with_default_backends(SessionConfig::default());
//!     let session = controller.start_session();
//!
//!     let upload = Upload::from_path("document.pdf").await?;
//!     let (session, summary) = controller.upload(&session, &upload).await.into_parts();
//!     println!("{} pages", summary?.page_count);
//!
//!     let model = session.selected_model().to_string();
//!     let (session, loaded) = controller.load_model(&session, &model).await.into_parts();
//!     loaded?;
//!
//!     let prompt = controller.config().default_prompt.clone();
//!     let (_session, result) = controller.extract(&session, &prompt).await.into_parts();
//!     println!("{}", result?.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-session` binary (clap + anyhow + indicatif + tracing-subscriber + serde_json + shlex) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod presentation;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationOptions, SessionConfig, SessionConfigBuilder};
pub use controller::{LoadStatus, SessionController, Transition, UploadSummary};
pub use error::{ErrorKind, OcrError};
pub use models::{ModelCatalog, ModelInfo, KNOWN_MODELS};
pub use pipeline::encode::ImageProcessor;
pub use pipeline::input::Upload;
pub use pipeline::llm::{
    Generation, LlmModelLoader, LlmVisionModel, ModelConfig, ModelFamily, ModelHandle,
    ModelLoader, VisionModel,
};
pub use pipeline::render::{PdfRasterizer, PdfiumRasterizer};
pub use presentation::{present, DisplayMode, DownloadArtifact, PagePreview, View};
pub use progress::{Action, NoopObserver, SessionObserver};
pub use prompts::{format_prompt, FormattedPrompt, DEFAULT_OCR_PROMPT};
pub use session::{Document, ExtractionResult, ModelSlot, Session, SessionState};
