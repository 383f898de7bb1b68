//! Extraction orchestrator and public entry points.
//!
//! For a PDF the orchestrator:
//!
//! 1. partitions the whole document into text blocks (fast mode),
//!    transcribing pages without a text layer when a describer is available,
//! 2. pulls every embedded image,
//! 3. captions the images one at a time, turning each into exactly one
//!    [`ImageOutcome`],
//! 4. appends an "Embedded Images" section when any caption was produced,
//! 5. logs statistics.
//!
//! Per-image problems are contained in their outcome. Only a failure of the
//! document as a whole (unreadable file, pdfium missing, partitioning error)
//! is returned, always as a [`MediaProcessingError`] carrying the cause.
//!
//! Classification ([`classify`]) and assembly ([`assemble`]) are pure
//! functions over the per-image results so they can be tested without pdfium
//! or a model.

use crate::config::ExtractionConfig;
use crate::error::{MediaProcessingError, PipelineError};
use crate::output::{ExtractionResult, ExtractionStats, ExtractorOutput, ImageOutcome, ImageRecord};
use crate::pipeline::backend::{DocumentBackend, PdfiumBackend};
use crate::pipeline::caption::{caption_image, resolve_describer, Caption, ImageDescriber};
use crate::pipeline::input::{self, FileKind};
use crate::pipeline::partition::TextBlock;
use crate::pipeline::{ocr, partition};
use crate::progress::ProgressCallback;
use crate::prompts::{PromptLibrary, PromptName};
use crate::report::log_statistics;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Failure reason recorded when the adapter produced no caption text.
pub const NO_RESULT_REASON: &str = "Claude processing failed";

/// Heading of the caption section appended to the document text.
pub const EMBEDDED_IMAGES_HEADING: &str = "Embedded Images:";

/// Result of captioning one image: its outcome plus, on success, the caption
/// line to append to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionedImage {
    pub outcome: ImageOutcome,
    pub caption_line: Option<String>,
}

/// Turn one adapter result into an outcome.
///
/// `attempt` is `Err` when the per-image call itself blew up (a panic inside
/// the describer); the message becomes the failure reason.
pub fn classify(image: &ImageRecord, attempt: Result<Caption, String>) -> CaptionedImage {
    let page = image.page_num;
    let image_num = image.image_num;

    match attempt {
        Ok(caption) => match caption.text().filter(|t| !t.is_empty()) {
            Some(text) => CaptionedImage {
                outcome: ImageOutcome::Success { page, image_num },
                caption_line: Some(format!("[Image on page {page}: {text}]")),
            },
            None => CaptionedImage {
                outcome: ImageOutcome::Failure {
                    page,
                    image_num,
                    reason: NO_RESULT_REASON.to_string(),
                },
                caption_line: None,
            },
        },
        Err(reason) => CaptionedImage {
            outcome: ImageOutcome::Failure {
                page,
                image_num,
                reason,
            },
            caption_line: None,
        },
    }
}

/// Merge the partitioned text with the per-image results.
pub fn assemble(text: &str, captioned: Vec<CaptionedImage>) -> ExtractionResult {
    let mut lines = Vec::new();
    let mut outcomes = Vec::with_capacity(captioned.len());
    for c in captioned {
        if let Some(line) = c.caption_line {
            lines.push(line);
        }
        outcomes.push(c.outcome);
    }

    let mut content = text.to_string();
    if !lines.is_empty() {
        content.push_str("\n\n");
        content.push_str(EMBEDDED_IMAGES_HEADING);
        content.push('\n');
        content.push_str(&lines.join("\n"));
    }

    ExtractionResult {
        content,
        stats: ExtractionStats::from_outcomes(&outcomes),
        outcomes,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "image processing panicked".to_string()
    }
}

// ── Extractor ────────────────────────────────────────────────────────────

/// Runs extractions with a fixed backend, describer, and prompt set.
///
/// Holds no per-document state; one `Extractor` can serve any number of
/// requests, concurrently.
pub struct Extractor {
    backend: Arc<dyn DocumentBackend>,
    describer: Option<Arc<dyn ImageDescriber>>,
    describe_images: bool,
    ocr_scanned_pages: bool,
    prompts: PromptLibrary,
    progress: Option<ProgressCallback>,
}

impl Extractor {
    /// Assemble an extractor from explicit parts.
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        describer: Option<Arc<dyn ImageDescriber>>,
        prompts: PromptLibrary,
    ) -> Self {
        Self {
            backend,
            describer,
            describe_images: true,
            ocr_scanned_pages: true,
            prompts,
            progress: None,
        }
    }

    /// Build the production extractor: pdfium backend, resolved provider,
    /// built-in prompts with any overrides from `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, PipelineError> {
        let backend = PdfiumBackend::new(config.resolved_pdfium_path(), config.password.clone());
        let describer = resolve_describer(config)?;

        let mut prompts = PromptLibrary::builtin();
        if let Some(ref p) = config.image_prompt {
            prompts = prompts.with_prompt(PromptName::ImageExtraction, p.as_str());
        }
        if let Some(ref p) = config.ocr_prompt {
            prompts = prompts.with_prompt(PromptName::ImageOcr, p.as_str());
        }

        let mut extractor = Self::new(Arc::new(backend), describer, prompts);
        extractor.describe_images = config.describe_images;
        extractor.ocr_scanned_pages = config.ocr_scanned_pages;
        extractor.progress = config.progress_callback.clone();
        Ok(extractor)
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Whether embedded images are sent to the describer.
    pub fn with_image_descriptions(mut self, enabled: bool) -> Self {
        self.describe_images = enabled;
        self
    }

    /// Whether pages without a text layer are rendered and transcribed.
    pub fn with_scanned_page_ocr(mut self, enabled: bool) -> Self {
        self.ocr_scanned_pages = enabled;
        self
    }

    /// Validate a local file and route it by extension.
    pub async fn extract_file(&self, path: &Path) -> Result<ExtractionResult, MediaProcessingError> {
        let kind = FileKind::from_path(path).map_err(MediaProcessingError::pdf)?;
        let resolved = input::resolve_local(path).map_err(|e| wrap(kind, e))?;
        match resolved.kind() {
            FileKind::Pdf => self.extract_pdf(resolved.path()).await,
            FileKind::Image => self.extract_image(resolved.path()).await,
        }
    }

    /// Extract text and image captions from a PDF.
    pub async fn extract_pdf(&self, path: &Path) -> Result<ExtractionResult, MediaProcessingError> {
        debug!("Extracting text from PDF file: {}", path.display());
        match self.run_pdf(path).await {
            Ok(result) => {
                log_statistics(path, &result);
                debug!("Final extracted content from PDF {}:\n{}", path.display(), result.content);
                Ok(result)
            }
            Err(e) => {
                error!("Failed to process PDF {}: {}", path.display(), e);
                Err(MediaProcessingError::pdf(e))
            }
        }
    }

    /// Transcribe a standalone image.
    pub async fn extract_image(&self, path: &Path) -> Result<ExtractionResult, MediaProcessingError> {
        let start = Instant::now();
        let text = ocr::transcribe_image(
            path,
            self.describer.as_deref(),
            self.prompts.get_prompt(PromptName::ImageOcr),
        )
        .await
        .map_err(|e| {
            error!("Failed to process image {}: {}", path.display(), e);
            MediaProcessingError::image(e)
        })?;

        info!("Transcribed {} chars from image {}", text.len(), path.display());
        Ok(ExtractionResult {
            content: text,
            outcomes: Vec::new(),
            stats: ExtractionStats {
                duration_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            },
        })
    }

    async fn run_pdf(&self, path: &Path) -> Result<ExtractionResult, PipelineError> {
        let start = Instant::now();

        // ── Step 1: Partition text ───────────────────────────────────────
        let mut blocks = self
            .blocking(path, |backend, p| backend.partition(p))
            .await?;
        if self.ocr_scanned_pages {
            blocks = self.transcribe_scanned_pages(path, blocks).await;
        }
        let text = partition::join_text(&blocks);

        // ── Step 2: Extract embedded images ──────────────────────────────
        let images = self
            .blocking(path, |backend, p| backend.extract_images(p))
            .await?;
        info!("Extracted {} embedded images from {}", images.len(), path.display());

        // ── Step 3: Caption images ───────────────────────────────────────
        let captioned = self.caption_all(&images).await;

        // ── Step 4: Assemble ─────────────────────────────────────────────
        let mut result = assemble(&text, captioned);
        result.stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Fill pages that have no text layer with an OCR transcript.
    ///
    /// Best effort: without a describer nothing happens, and a page that
    /// fails to render or transcribe keeps its empty block.
    async fn transcribe_scanned_pages(&self, path: &Path, blocks: Vec<TextBlock>) -> Vec<TextBlock> {
        let pages = partition::pages_without_text(&blocks);
        if pages.is_empty() {
            return blocks;
        }
        let Some(describer) = self.describer.as_deref() else {
            debug!("{} pages have no text layer; no vision provider to OCR them", pages.len());
            return blocks;
        };
        let Some(prompt) = self.prompts.get_prompt(PromptName::ImageOcr) else {
            warn!("OCR prompt is missing; {} scanned pages stay empty", pages.len());
            return blocks;
        };

        info!("Transcribing {} pages without a text layer", pages.len());
        let rendered = match self
            .blocking(path, move |backend, p| backend.render_pages(p, &pages))
            .await
        {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("Failed to render scanned pages of {}: {}", path.display(), e);
                return blocks;
            }
        };

        let mut transcripts = Vec::with_capacity(rendered.len());
        for page in &rendered {
            let attempt = AssertUnwindSafe(ocr::transcribe_record(describer, prompt, page))
                .catch_unwind()
                .await;
            match attempt {
                Ok(Ok(text)) if !text.is_empty() => transcripts.push((page.page_num, text)),
                Ok(Ok(_)) => debug!("Page {} transcript is empty", page.page_num),
                Ok(Err(e)) => warn!("Failed to transcribe page {}: {}", page.page_num, e),
                Err(payload) => warn!(
                    "Transcribing page {} panicked: {}",
                    page.page_num,
                    panic_message(payload)
                ),
            }
        }
        partition::fill_pages(blocks, transcripts)
    }

    /// Run a backend call on the blocking pool.
    async fn blocking<T, F>(&self, path: &Path, f: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentBackend, &Path) -> Result<T, PipelineError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || f(backend.as_ref(), &path))
            .await
            .map_err(|e| PipelineError::Internal(format!("PDF task panicked: {}", e)))?
    }

    /// Caption every image sequentially, in extraction order.
    async fn caption_all(&self, images: &[ImageRecord]) -> Vec<CaptionedImage> {
        let describer = if self.describe_images {
            self.describer.as_deref()
        } else {
            None
        };
        let prompt = self.prompts.get_prompt(PromptName::ImageExtraction);
        if describer.is_some() && prompt.is_none() && !images.is_empty() {
            warn!("Image extraction prompt is missing; {} images will fail", images.len());
        }

        if let Some(ref cb) = self.progress {
            cb.on_extraction_start(images.len());
        }

        let mut captioned = Vec::with_capacity(images.len());
        for img in images {
            if let Some(ref cb) = self.progress {
                cb.on_image_start(img.page_num, img.image_num);
            }

            let attempt = AssertUnwindSafe(caption_image(describer, prompt, img))
                .catch_unwind()
                .await
                .map_err(panic_message);
            let caption_len = attempt
                .as_ref()
                .ok()
                .and_then(Caption::text)
                .map_or(0, str::len);
            let c = classify(img, attempt);

            if let Some(ref cb) = self.progress {
                match &c.outcome {
                    ImageOutcome::Success { .. } => {
                        cb.on_image_complete(img.page_num, img.image_num, caption_len)
                    }
                    ImageOutcome::Failure { reason, .. } => {
                        cb.on_image_error(img.page_num, img.image_num, reason.clone())
                    }
                }
            }
            captioned.push(c);
        }

        if let Some(ref cb) = self.progress {
            let succeeded = captioned.iter().filter(|c| c.outcome.is_success()).count();
            cb.on_extraction_complete(captioned.len(), succeeded);
        }

        captioned
    }
}

fn wrap(kind: FileKind, e: PipelineError) -> MediaProcessingError {
    match kind {
        FileKind::Pdf => MediaProcessingError::pdf(e),
        FileKind::Image => MediaProcessingError::image(e),
    }
}

/// Pick the user-facing message for an input whose kind may be unknown.
fn wrap_for_input(input: &str, e: PipelineError) -> MediaProcessingError {
    match FileKind::from_path(Path::new(input)) {
        Ok(kind) => wrap(kind, e),
        Err(_) => MediaProcessingError::pdf(e),
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Extract a PDF or image (local path or HTTP/HTTPS URL) with full
/// per-image bookkeeping.
///
/// # Errors
/// Returns [`MediaProcessingError`] only when the document as a whole cannot
/// be processed. Individual image failures are reported in
/// `result.outcomes` and never abort the document.
pub async fn extract_detailed(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, MediaProcessingError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let extractor = Extractor::from_config(config).map_err(|e| wrap_for_input(input_str, e))?;
    let resolved = input::resolve_input(input_str, config.download_timeout_secs)
        .await
        .map_err(|e| wrap_for_input(input_str, e))?;

    match resolved.kind() {
        FileKind::Pdf => extractor.extract_pdf(resolved.path()).await,
        FileKind::Image => extractor.extract_image(resolved.path()).await,
    }
}

/// Extract a document and return only the boundary record.
///
/// This is the primary entry point for the library.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractorOutput, MediaProcessingError> {
    extract_detailed(input_str, config)
        .await
        .map(ExtractionResult::into_output)
}

/// Extract a document and write its content directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, MediaProcessingError> {
    let input_str = input_str.as_ref();
    let result = extract_detailed(input_str, config).await?;
    let path = output_path.as_ref();

    let write_failed = |source: std::io::Error| {
        wrap_for_input(
            input_str,
            PipelineError::OutputWriteFailed {
                path: path.to_path_buf(),
                source,
            },
        )
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, &result.content)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    Ok(result.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractorOutput, MediaProcessingError> {
    let input_str = input_str.as_ref();
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            wrap_for_input(
                input_str,
                PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)),
            )
        })?
        .block_on(extract(input_str, config))
}
