//! Error types for the docextract library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal cause**: the document cannot be processed at
//!   all (bad input file, pdfium missing, provider misconfigured).
//!
//! * [`MediaProcessingError`] — the single error returned by the `extract*`
//!   entry points. It wraps a [`PipelineError`] together with a fixed,
//!   user-facing message so callers can show the message and log the cause.
//!
//! * [`CaptionError`] — **Non-fatal**: one remote captioning call failed.
//!   It never leaves [`crate::pipeline::caption`]; the adapter turns it into a
//!   placeholder caption so the rest of the document is unaffected.

use std::path::PathBuf;
use thiserror::Error;

/// User-facing message attached to every failed PDF extraction.
pub const PDF_FAILURE_MESSAGE: &str = "Failed to process the PDF file.";

/// User-facing message attached to every failed image OCR.
pub const IMAGE_FAILURE_MESSAGE: &str = "Failed to process the image file.";

/// All fatal causes of a failed extraction.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is not on the allow-list.
    #[error("Unsupported file format '{extension}' for '{path}'\nSupported: .pdf, .png, .jpg, .jpeg, .bmp, .tiff")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file has a `.pdf` extension but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// pdfium could not open or parse the document.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none (or the wrong one) was provided.
    #[error("PDF '{path}' is encrypted and requires a valid password.")]
    PasswordRequired { path: PathBuf },

    /// Text could not be read from a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    PartitionFailed { page: usize, detail: String },

    /// A standalone image file could not be decoded or re-encoded.
    #[error("Could not decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib), place the\n\
library in the working directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// A provider was requested but could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The OCR call for a standalone image failed.
    #[error("Image transcription failed: {0}")]
    TranscriptionFailed(#[from] CaptionError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The one error surfaced by the extraction entry points.
///
/// `message` is fixed per operation and safe to show to end users;
/// `source` carries the underlying cause for logs.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MediaProcessingError {
    pub message: &'static str,
    #[source]
    pub source: PipelineError,
}

impl MediaProcessingError {
    /// Wrap a cause raised while processing a PDF.
    pub fn pdf(source: PipelineError) -> Self {
        Self {
            message: PDF_FAILURE_MESSAGE,
            source,
        }
    }

    /// Wrap a cause raised while OCR-ing a standalone image.
    pub fn image(source: PipelineError) -> Self {
        Self {
            message: IMAGE_FAILURE_MESSAGE,
            source,
        }
    }
}

/// A non-fatal error for one remote vision call.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum CaptionError {
    /// The provider returned an error after all retries.
    #[error("LLM call failed after {retries} retries: {detail}")]
    Llm { retries: u32, detail: String },

    /// The call did not complete within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with an empty body.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}
