//! Pipeline stages for document extraction.
//!
//! Each submodule implements one step. Keeping stages separate makes each
//! independently testable and lets the PDF library or the vision provider be
//! swapped without touching the orchestrator.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ backend ──┬─▶ partition ─────────────▶ text
//! (path/URL) (pdfium) └─▶ images ──▶ caption ────▶ captions
//!                         (base64)   (VLM, sequential)
//!
//! input ──▶ ocr ──▶ text                (standalone images)
//! ```
//!
//! 1. [`input`]     — allow-list the extension, resolve URL or local path
//! 2. [`backend`]   — open the PDF with pdfium; runs in `spawn_blocking`
//! 3. [`partition`] — fast text-layer split into blocks
//! 4. [`images`]    — PNG-encode and base64-wrap each embedded image
//! 5. [`caption`]   — describe one image via the VLM; never fails
//! 6. [`ocr`]       — transcribe a standalone image via the VLM

pub mod backend;
pub mod caption;
pub mod images;
pub mod input;
pub mod ocr;
pub mod partition;
