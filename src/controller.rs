//! The OCR session controller.
//!
//! Each user action is a transition function: it takes the current
//! [`Session`] snapshot and returns a [`Transition`] holding the snapshot to
//! show next plus the action's outcome. Errors never cascade: a failed upload
//! or extraction hands back the input snapshot unchanged, and a failed model
//! load leaves the session "not ready" with no handle.
//!
//! Actions are `async` but meant to be awaited one at a time; the controller
//! holds no per-session state of its own.

use crate::config::SessionConfig;
use crate::error::OcrError;
use crate::pipeline::input::Upload;
use crate::pipeline::llm::{LlmModelLoader, ModelLoader};
use crate::pipeline::render::{self, PdfRasterizer, PdfiumRasterizer};
use crate::progress::{Action, NoopObserver, ObserverHandle};
use crate::prompts::format_prompt;
use crate::session::{Document, ExtractionResult, ModelSlot, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Snapshot after an action, together with the action's outcome.
#[derive(Debug)]
pub struct Transition<T> {
    pub session: Session,
    pub outcome: Result<T, OcrError>,
}

impl<T> Transition<T> {
    fn ok(session: Session, value: T) -> Self {
        Self {
            session,
            outcome: Ok(value),
        }
    }

    fn err(session: Session, error: OcrError) -> Self {
        Self {
            session,
            outcome: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_parts(self) -> (Session, Result<T, OcrError>) {
        (self.session, self.outcome)
    }
}

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub file_name: String,
    pub page_count: usize,
}

/// Outcome of a successful `load_model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    /// The loader ran and the handle is now ready.
    Loaded,
    /// The requested model was already loaded; nothing was done.
    AlreadyReady,
}

/// Sequences uploads, model loads and extractions over session snapshots.
pub struct SessionController {
    config: SessionConfig,
    rasterizer: Arc<dyn PdfRasterizer>,
    loader: Arc<dyn ModelLoader>,
    observer: ObserverHandle,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        rasterizer: Arc<dyn PdfRasterizer>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            loader,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Controller using pdfium and the configured edgequake-llm provider.
    pub fn with_default_backends(config: SessionConfig) -> Self {
        let rasterizer = Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels));
        let loader = Arc::new(LlmModelLoader::new(
            config.provider_name.clone(),
            config.warmup_on_load,
        ));
        Self::new(config, rasterizer, loader)
    }

    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A new session with the catalogue's first model selected.
    pub fn start_session(&self) -> Session {
        Session::new(self.config.default_model())
    }

    /// Rasterise an uploaded PDF and make page 1 current.
    pub async fn upload(&self, session: &Session, upload: &Upload) -> Transition<UploadSummary> {
        info!("Upload: {} ({} bytes)", upload.file_name, upload.bytes.len());
        self.observer
            .on_action_start(Action::Upload, &upload.file_name);
        let start = Instant::now();

        match render::rasterize_upload(Arc::clone(&self.rasterizer), upload, self.config.dpi).await
        {
            Ok(pages) => {
                let summary = UploadSummary {
                    file_name: upload.file_name.clone(),
                    page_count: pages.len(),
                };
                info!(
                    "Rendered {} page(s) of {} in {}ms",
                    summary.page_count,
                    summary.file_name,
                    start.elapsed().as_millis()
                );
                self.observer.on_action_complete(
                    Action::Upload,
                    &format!("Found {} page(s)", summary.page_count),
                );
                let next = session.with_document(Document::new(&upload.file_name, pages));
                Transition::ok(next, summary)
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", upload.file_name, e);
                self.observer.on_action_error(Action::Upload, &e);
                Transition::err(session.clone(), e)
            }
        }
    }

    /// Make `page` (1-indexed) the current page.
    ///
    /// The stored result survives only if it was read from `page`.
    pub fn select_page(&self, session: &Session, page: usize) -> Transition<()> {
        let Some(document) = session.document() else {
            return Transition::err(session.clone(), OcrError::NoDocument);
        };
        if !document.page_numbers().contains(&page) {
            return Transition::err(
                session.clone(),
                OcrError::PageOutOfRange {
                    page,
                    total: document.page_count(),
                },
            );
        }
        debug!("Selected page {}", page);
        Transition::ok(session.with_page(page), ())
    }

    /// Change the model selection. A ready model for another identifier is dropped.
    pub fn select_model(&self, session: &Session, identifier: &str) -> Session {
        if identifier != session.selected_model() {
            debug!("Selected model {}", identifier);
        }
        session.with_selected_model(identifier)
    }

    /// Select and load `identifier`.
    ///
    /// A no-op when that model is already ready. On failure the session has
    /// no model loaded, even if a different one was ready before.
    pub async fn load_model(&self, session: &Session, identifier: &str) -> Transition<LoadStatus> {
        if session
            .ready_model()
            .is_some_and(|h| h.identifier == identifier)
        {
            debug!("Model {} already ready", identifier);
            return Transition::ok(session.clone(), LoadStatus::AlreadyReady);
        }

        let base = session.with_selected_model(identifier);
        self.observer.on_action_start(Action::LoadModel, identifier);
        let start = Instant::now();

        match self.loader.load(identifier).await {
            Ok(handle) => {
                info!(
                    "Model ready: {} ({}ms)",
                    identifier,
                    start.elapsed().as_millis()
                );
                self.observer
                    .on_action_complete(Action::LoadModel, &format!("Model ready: {identifier}"));
                Transition::ok(base.with_model(ModelSlot::Ready(handle)), LoadStatus::Loaded)
            }
            Err(e) => {
                warn!("Model load failed: {}", e);
                self.observer.on_action_error(Action::LoadModel, &e);
                Transition::err(base.with_model(ModelSlot::NotReady), e)
            }
        }
    }

    /// Run OCR on the current page with `prompt`.
    pub async fn extract(&self, session: &Session, prompt: &str) -> Transition<ExtractionResult> {
        let Some(document) = session.document() else {
            return Transition::err(session.clone(), OcrError::NoDocument);
        };
        let Some(handle) = session.ready_model() else {
            return Transition::err(
                session.clone(),
                OcrError::ModelNotReady {
                    selected: session.selected_model().to_string(),
                },
            );
        };

        let page_num = document.current_page();
        self.observer
            .on_action_start(Action::Extract, &format!("page {page_num}"));
        let start = Instant::now();

        let generation = match format_prompt(&handle.processor, &handle.config, prompt, 1) {
            Ok(formatted) => {
                handle
                    .model
                    .generate(
                        &handle.processor,
                        &formatted,
                        document.current_image(),
                        &self.config.generation,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match generation {
            Ok(generation) => {
                let result = ExtractionResult {
                    page_num,
                    text: generation.text,
                    model: handle.identifier.clone(),
                    input_tokens: generation.input_tokens,
                    output_tokens: generation.output_tokens,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    "Page {}: {} chars in {}ms",
                    page_num,
                    result.text.len(),
                    result.duration_ms
                );
                self.observer.on_action_complete(
                    Action::Extract,
                    &format!("Extracted {} chars from page {page_num}", result.text.len()),
                );
                Transition::ok(session.with_result(result.clone()), result)
            }
            Err(e) => {
                warn!("Page {}: extraction failed: {}", page_num, e);
                self.observer.on_action_error(Action::Extract, &e);
                Transition::err(session.clone(), e)
            }
        }
    }
}
