//! Post-run statistics logging.
//!
//! Reporting is side-effect only and must never fail the extraction: if the
//! failure list cannot be serialised, it is logged with `Debug` formatting
//! instead.

use crate::output::{ExtractionResult, ImageOutcome};
use std::path::Path;
use tracing::{info, warn};

/// Log per-document statistics and, when any image failed, a structured
/// dump of the failures.
pub fn log_statistics(path: &Path, result: &ExtractionResult) {
    let stats = &result.stats;
    info!(
        file = %path.display(),
        total_images = stats.total_images,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "PDF processing statistics: {}/{} images captioned, success rate {:.2}%",
        stats.succeeded,
        stats.total_images,
        stats.success_rate(),
    );

    let failures: Vec<&ImageOutcome> = result.failures().collect();
    if failures.is_empty() {
        return;
    }

    let dump = serde_json::to_string_pretty(&failures).unwrap_or_else(|_| format!("{failures:#?}"));
    warn!(
        file = %path.display(),
        failed = failures.len(),
        "Failed image extractions:\n{dump}"
    );
}
