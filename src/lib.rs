//! # docextract
//!
//! Extract text from PDFs and images, and describe the images embedded in
//! PDFs with a Vision Language Model (VLM).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL; allow-list check
//!  ├─ 2. Partition  text layer → blocks via pdfium (spawn_blocking)
//!  ├─ 3. Images     embedded rasters → base64 PNG records
//!  ├─ 4. Caption    one VLM call per image, sequential, never fatal
//!  ├─ 5. Assemble   text + "Embedded Images:" section
//!  └─ 6. Report     success/failure statistics to the log
//! ```
//!
//! Standalone images (`.png`, `.jpg`, `.jpeg`, `.bmp`, `.tiff`) skip the PDF
//! stages and are transcribed directly by the VLM.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docextract::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from ANTHROPIC_API_KEY / OPENAI_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let output = extract("report.pdf", &config).await?;
//!     println!("{}", output.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A bad embedded image or a failed VLM call affects only that image's
//! [`ImageOutcome`]. Only a failure of the whole document surfaces as an
//! error, always a [`MediaProcessingError`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{CaptionError, MediaProcessingError, PipelineError};
pub use extract::{extract, extract_detailed, extract_sync, extract_to_file, Extractor};
pub use output::{ExtractionResult, ExtractionStats, ExtractorOutput, ImageOutcome, ImageRecord};
pub use pipeline::backend::{DocumentBackend, PdfiumBackend};
pub use pipeline::caption::{Caption, ImageDescriber, LlmDescriber};
pub use pipeline::partition::TextBlock;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{PromptLibrary, PromptName};
