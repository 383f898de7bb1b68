//! Progress-callback trait for per-image extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator captions each embedded image.
//!
//! # Example
//!
//! ```rust
//! use docextract::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, page_num: usize, image_num: usize, caption_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num} image {image_num}: {caption_len} chars");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each extracted image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Images are captioned sequentially, but the callback
/// must still be `Send + Sync` because the extraction future may move
/// between worker threads.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after image extraction, before any captioning call.
    fn on_extraction_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before the vision request is sent for an image.
    fn on_image_start(&self, page_num: usize, image_num: usize) {
        let _ = (page_num, image_num);
    }

    /// Called when an image was captioned.
    ///
    /// `caption_len` is the byte length of the caption text.
    fn on_image_complete(&self, page_num: usize, image_num: usize, caption_len: usize) {
        let _ = (page_num, image_num, caption_len);
    }

    /// Called when an image yielded a failure outcome.
    fn on_image_error(&self, page_num: usize, image_num: usize, reason: String) {
        let _ = (page_num, image_num, reason);
    }

    /// Called once after every image has been attempted.
    fn on_extraction_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
