//! Session-flow integration tests.
//!
//! The rasteriser and model loader are replaced with in-memory fakes so these
//! run without pdfium or an inference server. Each fake page image is a 1×1
//! pixel whose red channel holds the page number, which lets the fake model
//! report exactly which page it was shown.

use async_trait::async_trait;
use edgequake_ocr_session::{
    present, Action, DisplayMode, DownloadArtifact, ErrorKind, FormattedPrompt, GenerationOptions,
    Generation, ImageProcessor, LoadStatus, ModelHandle, ModelLoader, OcrError, PdfRasterizer,
    Session, SessionConfig, SessionController, SessionObserver, SessionState, Upload, VisionModel,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeRasterizer {
    pages: usize,
    calls: AtomicUsize,
}

impl PdfRasterizer for FakeRasterizer {
    fn convert(&self, path: &Path, _dpi: u32) -> Result<Vec<DynamicImage>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = std::fs::read(path).map_err(|e| OcrError::Conversion {
            name: path.display().to_string(),
            detail: e.to_string(),
        })?;
        if bytes.windows(7).any(|w| w == b"CORRUPT") {
            return Err(OcrError::Conversion {
                name: path.display().to_string(),
                detail: "trailer not found".into(),
            });
        }
        Ok((1..=self.pages)
            .map(|n| DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([n as u8, 0, 0, 255]))))
            .collect())
    }
}

#[derive(Default)]
struct FakeModel {
    calls: AtomicUsize,
    fail: AtomicBool,
    last_prompt: Mutex<Option<FormattedPrompt>>,
    last_options: Mutex<Option<GenerationOptions>>,
}

#[async_trait]
impl VisionModel for FakeModel {
    async fn generate(
        &self,
        _processor: &ImageProcessor,
        prompt: &FormattedPrompt,
        image: &DynamicImage,
        options: &GenerationOptions,
    ) -> Result<Generation, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        *self.last_options.lock().unwrap() = Some(*options);
        if self.fail.load(Ordering::SeqCst) {
            return Err(OcrError::Inference {
                detail: "out of memory".into(),
            });
        }
        let page = image.to_rgba8().get_pixel(0, 0).0[0];
        Ok(Generation {
            text: format!("# Page {page}\n\n| a | b |\n|---|---|\n| 1 | 2 |\n"),
            input_tokens: 10,
            output_tokens: 20,
        })
    }
}

struct FakeLoader {
    available: Vec<&'static str>,
    loads: AtomicUsize,
    model: Arc<FakeModel>,
}

#[async_trait]
impl ModelLoader for FakeLoader {
    async fn load(&self, identifier: &str) -> Result<ModelHandle, OcrError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.available.contains(&identifier) {
            return Err(OcrError::ModelLoad {
                identifier: identifier.to_string(),
                detail: "model not found".into(),
            });
        }
        Ok(ModelHandle::new(identifier, self.model.clone()))
    }
}

/// Busy-indicator events as `(action, phase)`, in call order.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<(Action, &'static str)>>,
}

impl RecordingObserver {
    fn take(&self) -> Vec<(Action, &'static str)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl SessionObserver for RecordingObserver {
    fn on_action_start(&self, action: Action, _detail: &str) {
        self.events.lock().unwrap().push((action, "start"));
    }

    fn on_action_complete(&self, action: Action, _summary: &str) {
        self.events.lock().unwrap().push((action, "complete"));
    }

    fn on_action_error(&self, action: Action, _error: &OcrError) {
        self.events.lock().unwrap().push((action, "error"));
    }
}

const A: &str = "mlx-community/Qwen3-VL-2B-Instruct-4bit";
const B: &str = "mlx-community/Qwen3-VL-8B-Instruct-4bit";
const MISSING: &str = "mlx-community/Qwen3-VL-32B-Instruct-4bit";

struct Harness {
    controller: SessionController,
    rasterizer: Arc<FakeRasterizer>,
    loader: Arc<FakeLoader>,
    model: Arc<FakeModel>,
    observer: Arc<RecordingObserver>,
}

fn harness(pages: usize) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let rasterizer = Arc::new(FakeRasterizer {
        pages,
        calls: AtomicUsize::new(0),
    });
    let model = Arc::new(FakeModel::default());
    let loader = Arc::new(FakeLoader {
        available: vec![A, B],
        loads: AtomicUsize::new(0),
        model: model.clone(),
    });
    let observer = Arc::new(RecordingObserver::default());
    let controller =
        SessionController::new(SessionConfig::default(), rasterizer.clone(), loader.clone())
            .with_observer(observer.clone());
    Harness {
        controller,
        rasterizer,
        loader,
        model,
        observer,
    }
}

fn pdf(name: &str) -> Upload {
    Upload::new(name, b"%PDF-1.7\n1 0 obj\n%%EOF".to_vec())
}

async fn uploaded(h: &Harness) -> Session {
    let t = h.controller.upload(&h.controller.start_session(), &pdf("doc.pdf")).await;
    assert!(t.is_ok(), "{:?}", t.outcome);
    t.session
}

async fn ready(h: &Harness, session: &Session, id: &str) -> Session {
    let t = h.controller.load_model(session, id).await;
    assert!(t.is_ok(), "{:?}", t.outcome);
    t.session
}

// ── Upload & render ──────────────────────────────────────────────────────────

#[tokio::test]
async fn single_page_pdf_yields_one_page_and_defaults_to_page_one() {
    let h = harness(1);
    let t = h.controller.upload(&h.controller.start_session(), &pdf("one.pdf")).await;
    let summary = t.outcome.as_ref().unwrap();
    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.file_name, "one.pdf");
    assert_eq!(t.session.current_page(), Some(1));
    assert_eq!(t.session.state(), SessionState::DocumentLoaded);
}

#[tokio::test]
async fn multi_page_selector_offers_exactly_one_to_n() {
    let h = harness(4);
    let session = uploaded(&h).await;
    let doc = session.document().unwrap();
    assert_eq!(doc.page_numbers().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    for k in 1..=4 {
        let t = h.controller.select_page(&session, k);
        let doc = t.session.document().unwrap();
        assert_eq!(doc.current_page(), k);
        assert_eq!(doc.current_image().to_rgba8().get_pixel(0, 0).0[0], k as u8);
    }
    // Page changes never re-rasterise.
    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn out_of_range_page_leaves_snapshot_untouched() {
    let h = harness(3);
    let session = uploaded(&h).await;
    for bad in [0, 4] {
        let t = h.controller.select_page(&session, bad);
        assert!(matches!(t.outcome, Err(OcrError::PageOutOfRange { total: 3, .. })));
        assert_eq!(t.session.current_page(), Some(1));
    }
}

#[tokio::test]
async fn failed_conversion_keeps_previous_document() {
    let h = harness(3);
    let session = uploaded(&h).await;
    let session = h.controller.select_page(&session, 2).session;

    let bad = Upload::new("broken.pdf", b"%PDF-1.7 CORRUPT".to_vec());
    let t = h.controller.upload(&session, &bad).await;
    let err = t.outcome.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert!(err.to_string().contains("broken.pdf"), "{err}");
    assert!(err.to_string().contains("trailer not found"), "{err}");
    assert_eq!(t.session.document().unwrap().file_name, "doc.pdf");
    assert_eq!(t.session.current_page(), Some(2));
}

#[tokio::test]
async fn non_pdf_upload_is_a_conversion_error() {
    let h = harness(1);
    let t = h
        .controller
        .upload(&h.controller.start_session(), &Upload::new("photo.png", b"\x89PNG".to_vec()))
        .await;
    assert_eq!(t.outcome.unwrap_err().kind(), ErrorKind::Conversion);
    assert_eq!(t.session.state(), SessionState::NoDocument);
    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn select_page_without_document_fails() {
    let h = harness(1);
    let session = h.controller.start_session();
    let t = h.controller.select_page(&session, 1);
    let err = t.outcome.unwrap_err();
    assert!(matches!(err, OcrError::NoDocument));
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(t.session.state(), SessionState::NoDocument);
    assert!(h.observer.take().is_empty());
}

// ── Model lifecycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn loading_the_same_model_twice_is_a_no_op() {
    let h = harness(1);
    let session = uploaded(&h).await;
    let first = h.controller.load_model(&session, A).await;
    assert!(matches!(first.outcome, Ok(LoadStatus::Loaded)));
    let second = h.controller.load_model(&first.session, A).await;
    assert!(matches!(second.outcome, Ok(LoadStatus::AlreadyReady)));
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(second.session.state(), SessionState::ModelReady);
}

#[tokio::test]
async fn changing_identifier_drops_readiness_until_reload() {
    let h = harness(1);
    let session = ready(&h, &uploaded(&h).await, A).await;
    assert!(session.is_model_ready());

    let session = h.controller.select_model(&session, B);
    assert_eq!(session.state(), SessionState::ModelNotReady);
    assert!(!session.is_model_ready());

    // Going back to A does not resurrect the old handle.
    let session = h.controller.select_model(&session, A);
    assert_eq!(session.state(), SessionState::ModelNotReady);

    let session = ready(&h, &session, A).await;
    assert_eq!(session.state(), SessionState::ModelReady);
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unavailable_model_fails_and_does_not_restore_previous() {
    let h = harness(1);
    let session = ready(&h, &uploaded(&h).await, A).await;

    let t = h.controller.load_model(&session, MISSING).await;
    let err = t.outcome.as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelLoad);
    assert!(err.to_string().contains(MISSING));
    assert_eq!(t.session.state(), SessionState::ModelNotReady);
    assert_eq!(t.session.selected_model(), MISSING);
    assert!(t.session.ready_model().is_none());

    // Extract now fails the precondition instead of using model A.
    let e = h.controller.extract(&t.session, "read").await;
    assert!(matches!(e.outcome, Err(OcrError::ModelNotReady { .. })));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn extract_without_model_is_a_precondition_failure() {
    let h = harness(2);
    let session = uploaded(&h).await;
    let t = h.controller.extract(&session, "read").await;
    let err = t.outcome.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelLoad);
    assert!(matches!(err, OcrError::ModelNotReady { .. }));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn extract_without_document_fails() {
    let h = harness(1);
    let session = ready(&h, &h.controller.start_session(), A).await;
    let t = h.controller.extract(&session, "read").await;
    assert!(matches!(t.outcome, Err(OcrError::NoDocument)));
}

#[tokio::test]
async fn extraction_uses_fixed_decoding_and_formatted_prompt() {
    let h = harness(1);
    let session = ready(&h, &uploaded(&h).await, A).await;
    let t = h.controller.extract(&session, "  Extract everything  ").await;
    assert!(t.is_ok());

    let options = h.model.last_options.lock().unwrap().unwrap();
    assert_eq!(options.max_tokens, 2048);
    assert_eq!(options.temperature, 0.1);
    assert!(!options.verbose);

    let prompt = h.model.last_prompt.lock().unwrap().clone().unwrap();
    assert_eq!(prompt.text, "Extract everything");
    assert_eq!(prompt.image_count, 1);
}

#[tokio::test]
async fn failed_extraction_keeps_previous_result() {
    let h = harness(1);
    let session = ready(&h, &uploaded(&h).await, A).await;
    let session = h.controller.extract(&session, "read").await.session;
    let before = session.result().cloned().unwrap();

    h.model.fail.store(true, Ordering::SeqCst);
    let t = h.controller.extract(&session, "read again").await;
    assert_eq!(t.outcome.unwrap_err().kind(), ErrorKind::Inference);
    assert_eq!(t.session.result(), Some(&before));
    assert_eq!(t.session.state(), SessionState::ResultAvailable);
}

#[tokio::test]
async fn blank_prompt_fails_before_generation() {
    let h = harness(1);
    let session = ready(&h, &uploaded(&h).await, A).await;
    let t = h.controller.extract(&session, " \n ").await;
    assert_eq!(t.outcome.unwrap_err().kind(), ErrorKind::Inference);
    assert_eq!(t.session.state(), SessionState::ModelReady);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_scenario_result_follows_page() {
    let h = harness(3);
    let session = uploaded(&h).await;
    let session = h.controller.select_page(&session, 2).session;
    let session = ready(&h, &session, A).await;

    let t = h.controller.extract(&session, "read").await;
    let result = t.outcome.unwrap();
    assert_eq!(result.page_num, 2);
    assert!(result.text.starts_with("# Page 2"));
    assert_eq!(result.model, A);
    let session = t.session;
    assert_eq!(session.state(), SessionState::ResultAvailable);

    // Re-selecting the same page keeps the result.
    let same = h.controller.select_page(&session, 2).session;
    assert_eq!(same.state(), SessionState::ResultAvailable);

    // Another page clears it until a new extract.
    let session = h.controller.select_page(&session, 3).session;
    assert!(session.result().is_none());
    assert_eq!(session.state(), SessionState::ModelReady);

    let result = h.controller.extract(&session, "read").await.outcome.unwrap();
    assert_eq!(result.page_num, 3);
    assert!(result.text.starts_with("# Page 3"));
}

#[tokio::test]
async fn new_upload_discards_result_but_keeps_model() {
    let h = harness(2);
    let session = ready(&h, &uploaded(&h).await, A).await;
    let session = h.controller.extract(&session, "read").await.session;
    assert_eq!(session.state(), SessionState::ResultAvailable);

    let session = h.controller.upload(&session, &pdf("other.pdf")).await.session;
    assert_eq!(session.state(), SessionState::ModelReady);
    assert_eq!(session.document().unwrap().file_name, "other.pdf");
}

#[tokio::test]
async fn presentation_and_download_carry_identical_bytes() {
    let h = harness(3);
    let session = uploaded(&h).await;
    let session = h.controller.select_page(&session, 3).session;
    let session = ready(&h, &session, A).await;
    let session = h.controller.extract(&session, "read").await.session;
    let result = session.result().unwrap();

    let plain = present(result, DisplayMode::Plain);
    let rendered = present(result, DisplayMode::Rendered);
    assert_eq!(plain.source.as_bytes(), rendered.source.as_bytes());
    assert_eq!(plain.body.as_bytes(), result.text.as_bytes());
    assert_ne!(rendered.body, plain.body);

    let dir = tempfile::tempdir().unwrap();
    let artifact = DownloadArtifact::for_result(result);
    assert_eq!(artifact.file_name, "ocr_page_3.txt");
    assert_eq!(artifact.mime_type, "text/plain");
    let path = artifact.write_to(dir.path()).await.unwrap();
    assert_eq!(std::fs::read(path).unwrap(), result.text.as_bytes());
}

// ── Busy indicator ───────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_reports_start_then_complete_or_error() {
    let h = harness(2);
    let session = uploaded(&h).await;
    assert_eq!(
        h.observer.take(),
        vec![(Action::Upload, "start"), (Action::Upload, "complete")]
    );

    let bad = Upload::new("broken.pdf", b"%PDF-1.7 CORRUPT".to_vec());
    let _ = h.controller.upload(&session, &bad).await;
    assert_eq!(
        h.observer.take(),
        vec![(Action::Upload, "start"), (Action::Upload, "error")]
    );
}

#[tokio::test]
async fn load_reports_events_except_for_already_ready() {
    let h = harness(1);
    let session = uploaded(&h).await;
    h.observer.take();

    let session = ready(&h, &session, A).await;
    assert_eq!(
        h.observer.take(),
        vec![(Action::LoadModel, "start"), (Action::LoadModel, "complete")]
    );

    let t = h.controller.load_model(&session, A).await;
    assert!(matches!(t.outcome, Ok(LoadStatus::AlreadyReady)));
    assert!(h.observer.take().is_empty());

    let _ = h.controller.load_model(&session, MISSING).await;
    assert_eq!(
        h.observer.take(),
        vec![(Action::LoadModel, "start"), (Action::LoadModel, "error")]
    );
}

#[tokio::test]
async fn extract_reports_events_and_skips_them_on_unmet_preconditions() {
    let h = harness(1);
    let session = uploaded(&h).await;
    h.observer.take();

    // No model: rejected before anything starts.
    let _ = h.controller.extract(&session, "read").await;
    assert!(h.observer.take().is_empty());

    let session = ready(&h, &session, A).await;
    h.observer.take();
    let session = h.controller.extract(&session, "read").await.session;
    assert_eq!(
        h.observer.take(),
        vec![(Action::Extract, "start"), (Action::Extract, "complete")]
    );

    h.model.fail.store(true, Ordering::SeqCst);
    let _ = h.controller.extract(&session, "read").await;
    assert_eq!(
        h.observer.take(),
        vec![(Action::Extract, "start"), (Action::Extract, "error")]
    );
}

#[tokio::test]
async fn page_and_model_selection_emit_no_busy_events() {
    let h = harness(3);
    let session = uploaded(&h).await;
    h.observer.take();
    let session = h.controller.select_page(&session, 2).session;
    let _ = h.controller.select_model(&session, B);
    assert!(h.observer.take().is_empty());
}
