//! Session snapshots and the derived state machine.
//!
//! A [`Session`] is an immutable-by-convention value: every action in
//! [`crate::controller`] takes the current snapshot and returns the next one.
//! Cloning is cheap: page images sit behind `Arc` and the model handle is a
//! pair of `Arc`s.
//!
//! ```text
//! NoDocument ─upload─▶ DocumentLoaded ─load─▶ ModelReady ─extract─▶ ResultAvailable
//!                          │                  ▲    │                     │
//!                          └─load fails─▶ ModelNotReady ◀─select other───┘
//! ```

use crate::pipeline::llm::ModelHandle;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The state a session is in, derived from its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    NoDocument,
    DocumentLoaded,
    ModelNotReady,
    ModelReady,
    ResultAvailable,
}

/// An uploaded PDF, rasterised.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pages: Arc<[Arc<DynamicImage>]>,
    current_page: usize,
}

impl Document {
    /// Wrap rendered pages; the first page is selected. `pages` must be non-empty.
    pub(crate) fn new(file_name: impl Into<String>, pages: Vec<DynamicImage>) -> Self {
        Self {
            file_name: file_name.into(),
            pages: pages.into_iter().map(Arc::new).collect(),
            current_page: 1,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page numbers the selector offers: 1..=N.
    pub fn page_numbers(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.page_count()
    }

    /// Selected page, 1-indexed.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Image of the selected page.
    pub fn current_image(&self) -> &Arc<DynamicImage> {
        &self.pages[self.current_page - 1]
    }

    /// Image of page `page` (1-indexed).
    pub fn page(&self, page: usize) -> Option<&Arc<DynamicImage>> {
        page.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    pub(crate) fn with_current_page(&self, page: usize) -> Self {
        Self {
            file_name: self.file_name.clone(),
            pages: Arc::clone(&self.pages),
            current_page: page,
        }
    }
}

/// Text produced by one extraction, tied to the page it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub page_num: usize,
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

/// Whether the selected model is usable.
#[derive(Debug, Clone, Default)]
pub enum ModelSlot {
    /// No load requested in this session yet.
    #[default]
    Idle,
    /// A load failed or the selection moved away from the loaded model.
    NotReady,
    /// Loaded and matching the selection.
    Ready(ModelHandle),
}

/// One snapshot of the interactive session.
#[derive(Debug, Clone)]
pub struct Session {
    selected_model: String,
    model: ModelSlot,
    document: Option<Document>,
    result: Option<ExtractionResult>,
}

impl Session {
    /// A fresh session with `selected_model` pre-selected.
    pub fn new(selected_model: impl Into<String>) -> Self {
        Self {
            selected_model: selected_model.into(),
            model: ModelSlot::Idle,
            document: None,
            result: None,
        }
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn model_slot(&self) -> &ModelSlot {
        &self.model
    }

    /// The loaded handle, if it matches the current selection.
    pub fn ready_model(&self) -> Option<&ModelHandle> {
        match &self.model {
            ModelSlot::Ready(handle) if handle.identifier == self.selected_model => Some(handle),
            _ => None,
        }
    }

    pub fn is_model_ready(&self) -> bool {
        self.ready_model().is_some()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Selected page, 1-indexed, if a document is loaded.
    pub fn current_page(&self) -> Option<usize> {
        self.document.as_ref().map(Document::current_page)
    }

    /// The last extraction, if it belongs to the selected page.
    pub fn result(&self) -> Option<&ExtractionResult> {
        self.result
            .as_ref()
            .filter(|r| Some(r.page_num) == self.current_page())
    }

    pub fn state(&self) -> SessionState {
        if self.document.is_none() {
            return SessionState::NoDocument;
        }
        if self.is_model_ready() {
            if self.result().is_some() {
                SessionState::ResultAvailable
            } else {
                SessionState::ModelReady
            }
        } else {
            match self.model {
                ModelSlot::Idle => SessionState::DocumentLoaded,
                _ => SessionState::ModelNotReady,
            }
        }
    }

    // ── Snapshot builders used by the controller ─────────────────────────

    pub(crate) fn with_document(&self, document: Document) -> Self {
        Self {
            document: Some(document),
            result: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_page(&self, page: usize) -> Self {
        let document = self.document.as_ref().map(|d| d.with_current_page(page));
        let result = self.result.clone().filter(|r| r.page_num == page);
        Self {
            document,
            result,
            ..self.clone()
        }
    }

    /// Change the selection; a loaded handle for another identifier is dropped.
    pub(crate) fn with_selected_model(&self, identifier: &str) -> Self {
        if identifier == self.selected_model {
            return self.clone();
        }
        let model = match &self.model {
            ModelSlot::Idle => ModelSlot::Idle,
            _ => ModelSlot::NotReady,
        };
        Self {
            selected_model: identifier.to_string(),
            model,
            ..self.clone()
        }
    }

    pub(crate) fn with_model(&self, slot: ModelSlot) -> Self {
        Self {
            model: slot,
            ..self.clone()
        }
    }

    pub(crate) fn with_result(&self, result: ExtractionResult) -> Self {
        Self {
            result: Some(result),
            ..self.clone()
        }
    }
}
