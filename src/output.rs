//! Result types produced by the extraction pipeline.
//!
//! Nothing here outlives a single request: the orchestrator builds an
//! [`ExtractionResult`] for one document and hands it back to the caller.

use serde::{Deserialize, Serialize};

/// One raster image pulled out of a PDF page, ready for the vision API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type of the decoded bytes, e.g. `image/png`.
    pub media_type: String,
    /// 1-indexed page the image was found on.
    pub page_num: usize,
    /// 1-indexed position of the image object within its page.
    pub image_num: usize,
}

/// Outcome of captioning one [`ImageRecord`].
///
/// Every extracted image yields exactly one outcome, in extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Success {
        page: usize,
        image_num: usize,
    },
    Failure {
        page: usize,
        image_num: usize,
        reason: String,
    },
}

impl ImageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ImageOutcome::Success { .. })
    }

    pub fn page(&self) -> usize {
        match self {
            ImageOutcome::Success { page, .. } | ImageOutcome::Failure { page, .. } => *page,
        }
    }
}

/// Aggregate counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_images: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Wall-clock time for the whole document.
    pub duration_ms: u64,
}

impl ExtractionStats {
    /// Tally a sequence of outcomes.
    pub fn from_outcomes(outcomes: &[ImageOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total_images: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            duration_ms: 0,
        }
    }

    /// Percentage of images captioned successfully; `0.0` when there were none.
    pub fn success_rate(&self) -> f64 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total_images as f64 * 100.0
    }
}

/// Everything the orchestrator learned about one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Partitioned text, followed by the "Embedded Images" section when any
    /// caption was produced.
    pub content: String,
    pub outcomes: Vec<ImageOutcome>,
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    /// Failure outcomes only, in extraction order.
    pub fn failures(&self) -> impl Iterator<Item = &ImageOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Drop the bookkeeping and keep what the caller displays.
    pub fn into_output(self) -> ExtractorOutput {
        ExtractorOutput::new(self.content)
    }
}

/// Record returned at the pipeline boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorOutput {
    pub content: String,
    /// Reserved for per-document metadata; always an empty object today.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ExtractorOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}
