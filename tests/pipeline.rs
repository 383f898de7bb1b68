//! Orchestrator integration tests.
//!
//! These drive [`Extractor`] with an in-memory document backend and stub
//! describers, so they need neither pdfium nor network access.

use async_trait::async_trait;
use docextract::error::PDF_FAILURE_MESSAGE;
use docextract::{
    CaptionError, DocumentBackend, ExtractionProgressCallback, Extractor, ImageDescriber,
    ImageOutcome, ImageRecord, PipelineError, PromptLibrary, PromptName, TextBlock,
};
use docextract::pipeline::images::collect_page_images;
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Stubs ────────────────────────────────────────────────────────────────────

/// Backend serving fixed blocks and images, or failing on partition.
///
/// Rendering returns one placeholder PNG per requested page and records
/// which pages were asked for.
struct MemoryBackend {
    blocks: Vec<TextBlock>,
    images: Vec<ImageRecord>,
    broken: bool,
    rendered: Mutex<Vec<usize>>,
}

impl MemoryBackend {
    fn new(blocks: Vec<TextBlock>, images: Vec<ImageRecord>) -> Arc<Self> {
        Arc::new(Self {
            blocks,
            images,
            broken: false,
            rendered: Mutex::new(Vec::new()),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            blocks: vec![],
            images: vec![],
            broken: true,
            rendered: Mutex::new(Vec::new()),
        })
    }

    fn rendered(&self) -> Vec<usize> {
        self.rendered.lock().unwrap().clone()
    }
}

impl DocumentBackend for MemoryBackend {
    fn partition(&self, path: &Path) -> Result<Vec<TextBlock>, PipelineError> {
        if self.broken {
            return Err(PipelineError::CorruptPdf {
                path: path.to_path_buf(),
                detail: "xref table missing".into(),
            });
        }
        Ok(self.blocks.clone())
    }

    fn extract_images(&self, _path: &Path) -> Result<Vec<ImageRecord>, PipelineError> {
        Ok(self.images.clone())
    }

    fn render_pages(&self, _path: &Path, pages: &[usize]) -> Result<Vec<ImageRecord>, PipelineError> {
        self.rendered.lock().unwrap().extend_from_slice(pages);
        Ok(pages.iter().map(|&p| image(p, 1)).collect())
    }
}

/// Answers from a fixed table keyed by (page, image); records call order.
struct ScriptedDescriber {
    answers: Vec<((usize, usize), Result<String, CaptionError>)>,
    calls: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedDescriber {
    fn answering(answers: Vec<((usize, usize), Result<String, CaptionError>)>) -> Arc<Self> {
        Arc::new(Self {
            answers,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageDescriber for ScriptedDescriber {
    async fn describe(&self, image: &ImageRecord, _prompt: &str) -> Result<String, CaptionError> {
        let key = (image.page_num, image.image_num);
        self.calls.lock().unwrap().push(key);
        self.answers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| Ok(format!("image {}.{}", key.0, key.1)))
    }
}

struct PanickingDescriber;

#[async_trait]
impl ImageDescriber for PanickingDescriber {
    async fn describe(&self, image: &ImageRecord, _prompt: &str) -> Result<String, CaptionError> {
        if image.page_num == 2 {
            panic!("decoder state corrupted");
        }
        Ok("a chart".into())
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for RecordingProgress {
    fn on_extraction_start(&self, total_images: usize) {
        self.events.lock().unwrap().push(format!("start {total_images}"));
    }
    fn on_image_start(&self, page_num: usize, image_num: usize) {
        self.events.lock().unwrap().push(format!("begin {page_num}.{image_num}"));
    }
    fn on_image_complete(&self, page_num: usize, image_num: usize, caption_len: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ok {page_num}.{image_num} {caption_len}"));
    }
    fn on_image_error(&self, page_num: usize, image_num: usize, _reason: String) {
        self.events.lock().unwrap().push(format!("err {page_num}.{image_num}"));
    }
    fn on_extraction_complete(&self, total_images: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_images}"));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

fn block(page_num: usize, text: &str) -> TextBlock {
    TextBlock {
        page_num,
        text: Some(text.to_string()),
    }
}

fn image(page_num: usize, image_num: usize) -> ImageRecord {
    ImageRecord {
        data: "iVBORw0KGgo=".into(),
        media_type: "image/png".into(),
        page_num,
        image_num,
    }
}

fn pdf_path() -> PathBuf {
    PathBuf::from("report.pdf")
}

/// Two pages of text with one image each; the page-2 image cannot be decoded.
fn two_page_backend() -> Arc<MemoryBackend> {
    let pixel = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255])));
    let mut images = Vec::new();
    collect_page_images(1, vec![Ok::<_, &str>(pixel)], &mut images);
    collect_page_images(2, vec![Err::<DynamicImage, _>("unsupported filter")], &mut images);

    MemoryBackend::new(
        vec![block(1, "Quarterly report"), block(2, "Revenue grew.")],
        images,
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn captions_are_appended_after_the_text() {
    let describer = ScriptedDescriber::answering(vec![((1, 1), Ok("a red circle".into()))]);
    let extractor = Extractor::new(two_page_backend(), Some(describer), PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(
        result.content,
        "Quarterly report\nRevenue grew.\n\nEmbedded Images:\n[Image on page 1: a red circle]"
    );
    assert_eq!(result.stats.total_images, 1);
    assert_eq!(result.stats.succeeded, 1);
    assert_eq!(result.stats.failed, 0);
    assert_eq!(result.stats.success_rate(), 100.0);
}

#[tokio::test]
async fn unconfigured_describer_yields_placeholders() {
    let extractor = Extractor::new(two_page_backend(), None, PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert!(result
        .content
        .ends_with("[Image on page 1: [Claude API not configured for image on page 1]]"));
    assert_eq!(result.outcomes, vec![ImageOutcome::Success { page: 1, image_num: 1 }]);
}

#[tokio::test]
async fn disabled_descriptions_never_call_the_model() {
    let describer = ScriptedDescriber::answering(vec![]);
    let extractor = Extractor::new(
        two_page_backend(),
        Some(describer.clone()),
        PromptLibrary::builtin(),
    )
    .with_image_descriptions(false);

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert!(describer.calls().is_empty());
    assert!(result.content.contains("Claude API not configured"));
}

#[tokio::test]
async fn remote_errors_become_placeholders() {
    let backend = MemoryBackend::new(vec![block(1, "Body")], vec![image(1, 1), image(1, 2)]);
    let describer = ScriptedDescriber::answering(vec![
        ((1, 1), Err(CaptionError::Timeout { secs: 60 })),
        ((1, 2), Err(CaptionError::EmptyResponse)),
    ]);
    let extractor = Extractor::new(backend, Some(describer), PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(
        result.content,
        "Body\n\nEmbedded Images:\n\
         [Image on page 1: [Failed to process image on page 1]]\n\
         [Image on page 1: [No response received for image on page 1]]"
    );
    assert_eq!(result.stats.succeeded, 2);
}

#[tokio::test]
async fn missing_prompt_fails_every_image_and_keeps_text() {
    let backend = MemoryBackend::new(
        vec![block(1, "Only text")],
        vec![image(1, 1), image(3, 1)],
    );
    let describer = ScriptedDescriber::answering(vec![]);
    let extractor = Extractor::new(backend, Some(describer.clone()), PromptLibrary::empty());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(result.content, "Only text");
    assert_eq!(result.stats.failed, 2);
    assert_eq!(result.stats.success_rate(), 0.0);
    assert!(describer.calls().is_empty());
    for outcome in &result.outcomes {
        match outcome {
            ImageOutcome::Failure { reason, .. } => assert_eq!(reason, "Claude processing failed"),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn images_are_captioned_in_page_then_index_order() {
    let backend = MemoryBackend::new(
        vec![block(1, "a"), block(2, "b")],
        vec![image(1, 1), image(1, 2), image(2, 1), image(2, 3)],
    );
    let describer = ScriptedDescriber::answering(vec![]);
    let extractor = Extractor::new(backend, Some(describer.clone()), PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(describer.calls(), vec![(1, 1), (1, 2), (2, 1), (2, 3)]);
    let pages: Vec<usize> = result.outcomes.iter().map(ImageOutcome::page).collect();
    assert_eq!(pages, vec![1, 1, 2, 2]);
    assert!(result.content.ends_with("[Image on page 2: image 2.3]"));
}

#[tokio::test]
async fn panicking_describer_fails_only_that_image() {
    let backend = MemoryBackend::new(
        vec![block(1, "Intro")],
        vec![image(1, 1), image(2, 1), image(3, 1)],
    );
    let extractor = Extractor::new(
        backend,
        Some(Arc::new(PanickingDescriber)),
        PromptLibrary::builtin(),
    );

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(result.stats.total_images, 3);
    assert_eq!(result.stats.succeeded, 2);
    assert_eq!(
        result.outcomes[1],
        ImageOutcome::Failure {
            page: 2,
            image_num: 1,
            reason: "decoder state corrupted".into()
        }
    );
    assert!(!result.content.contains("page 2:"));
}

#[tokio::test]
async fn document_failure_is_a_media_processing_error() {
    let extractor = Extractor::new(MemoryBackend::broken(), None, PromptLibrary::builtin());

    let err = extractor.extract_pdf(&pdf_path()).await.unwrap_err();

    assert_eq!(err.to_string(), PDF_FAILURE_MESSAGE);
    assert!(matches!(err.source, PipelineError::CorruptPdf { .. }));
}

#[tokio::test]
async fn page_without_text_contributes_nothing() {
    let backend = MemoryBackend::new(
        vec![
            block(1, "First"),
            TextBlock {
                page_num: 2,
                text: None,
            },
            block(3, "Third"),
        ],
        vec![],
    );
    let extractor = Extractor::new(backend.clone(), None, PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(result.content, "First\nThird");
    assert!(result.outcomes.is_empty());
    assert!(backend.rendered().is_empty());
}

fn scanned_backend() -> Arc<MemoryBackend> {
    MemoryBackend::new(
        vec![
            block(1, "Cover"),
            TextBlock {
                page_num: 2,
                text: None,
            },
            block(3, "Back"),
        ],
        vec![],
    )
}

#[tokio::test]
async fn pages_without_text_are_transcribed() {
    let backend = scanned_backend();
    let describer =
        ScriptedDescriber::answering(vec![((2, 1), Ok(" Invoice 42\n\nTotal:  12.50 ".into()))]);
    let extractor = Extractor::new(backend.clone(), Some(describer.clone()), PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(backend.rendered(), vec![2]);
    assert_eq!(describer.calls(), vec![(2, 1)]);
    assert_eq!(result.content, "Cover\nInvoice 42\nTotal: 12.50\nBack");
    assert!(result.outcomes.is_empty());
}

#[tokio::test]
async fn failed_page_transcription_leaves_page_empty() {
    let describer =
        ScriptedDescriber::answering(vec![((2, 1), Err(CaptionError::Timeout { secs: 60 }))]);
    let extractor = Extractor::new(scanned_backend(), Some(describer), PromptLibrary::builtin());

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(result.content, "Cover\nBack");
}

#[tokio::test]
async fn scanned_page_ocr_can_be_switched_off() {
    let backend = scanned_backend();
    let describer = ScriptedDescriber::answering(vec![]);
    let extractor = Extractor::new(backend.clone(), Some(describer.clone()), PromptLibrary::builtin())
        .with_scanned_page_ocr(false);

    let result = extractor.extract_pdf(&pdf_path()).await.unwrap();

    assert_eq!(result.content, "Cover\nBack");
    assert!(backend.rendered().is_empty());
    assert!(describer.calls().is_empty());
}

#[tokio::test]
async fn progress_events_follow_each_image() {
    let backend = MemoryBackend::new(vec![block(1, "x")], vec![image(1, 1), image(2, 1)]);
    let describer = ScriptedDescriber::answering(vec![((2, 1), Ok(String::new()))]);
    let progress = Arc::new(RecordingProgress::default());
    let prompts = PromptLibrary::empty().with_prompt(PromptName::ImageExtraction, "describe");
    let extractor =
        Extractor::new(backend, Some(describer), prompts).with_progress(progress.clone());

    extractor.extract_pdf(&pdf_path()).await.unwrap();

    // An empty answer is a placeholder caption, which still counts as success.
    // Lengths are those of the caption text, not of the "[Image on page …]" line.
    let events = progress.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 2",
            "begin 1.1",
            "ok 1.1 9",
            "begin 2.1",
            "ok 2.1 42",
            "done 2/2"
        ]
    );
}

#[tokio::test]
async fn extract_file_routes_images_to_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipt.png");
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])))
        .save(&path)
        .unwrap();
    let describer = ScriptedDescriber::answering(vec![((1, 1), Ok("  TOTAL 12.50 \n".into()))]);
    let extractor = Extractor::new(MemoryBackend::broken(), Some(describer), PromptLibrary::builtin());

    let result = extractor.extract_file(&path).await.unwrap();

    assert_eq!(result.content, "TOTAL 12.50");
    assert!(result.outcomes.is_empty());
}

#[tokio::test]
async fn extract_file_without_describer_fails_images() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.jpg");
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255])))
        .to_rgb8()
        .save(&path)
        .unwrap();
    let extractor = Extractor::new(MemoryBackend::broken(), None, PromptLibrary::builtin());

    let err = extractor.extract_file(&path).await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to process the image file.");
    assert!(matches!(err.source, PipelineError::ProviderNotConfigured { .. }));
}

#[tokio::test]
async fn extract_file_rejects_unlisted_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slides.pptx");
    std::fs::write(&path, b"PK\x03\x04").unwrap();
    let extractor = Extractor::new(two_page_backend(), None, PromptLibrary::builtin());

    let err = extractor.extract_file(&path).await.unwrap_err();

    assert!(matches!(err.source, PipelineError::UnsupportedFormat { .. }));
}

#[test]
fn repeated_runs_produce_identical_results() {
    let backend = MemoryBackend::new(
        vec![block(1, "Repeatable")],
        vec![image(1, 1), image(1, 2)],
    );
    let describer = ScriptedDescriber::answering(vec![((1, 2), Err(CaptionError::EmptyResponse))]);
    let extractor = Extractor::new(backend, Some(describer), PromptLibrary::builtin());

    let first = tokio_test::block_on(extractor.extract_pdf(&pdf_path())).unwrap();
    let second = tokio_test::block_on(extractor.extract_pdf(&pdf_path())).unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(first.outcomes, second.outcomes);
}
