//! Document access: text partitioning, embedded-image extraction, and page
//! rasterisation for scanned pages.
//!
//! [`DocumentBackend`] is the seam between the orchestrator and the PDF
//! library. [`PdfiumBackend`] is the production implementation; tests swap in
//! an in-memory backend.
//!
//! ## Why synchronous?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is not safe
//! to drive from async contexts. Backend methods are plain blocking functions
//! and the orchestrator runs them inside `tokio::task::spawn_blocking`.
//!
//! ## Handle lifetime
//!
//! Every method opens the document, works on it, and lets the `PdfDocument`
//! drop before returning. The handle is released on every exit path,
//! including early `?` returns.
//!
//! ## Nested images
//!
//! Producers often wrap rasters in form XObjects. Image discovery walks each
//! page's object tree depth-first, so an image inside a form is numbered at
//! the form's position in the page's content order.

use crate::error::PipelineError;
use crate::output::ImageRecord;
use crate::pipeline::images::{collect_page_images, encode_image, passthrough_media_type, EmbeddedImage};
use crate::pipeline::partition::{split_blocks, TextBlock};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Target width in pixels for pages rendered for OCR.
pub const RENDER_TARGET_WIDTH: Pixels = 2000;

/// Upper bound on rendered page height in pixels.
pub const RENDER_MAX_HEIGHT: Pixels = 2800;

/// Read access to a document's text and images.
pub trait DocumentBackend: Send + Sync {
    /// Split the whole document into text blocks, in page order.
    fn partition(&self, path: &Path) -> Result<Vec<TextBlock>, PipelineError>;

    /// Pull every embedded raster image, in page-then-index order.
    ///
    /// Individual images that cannot be decoded are skipped, not reported.
    fn extract_images(&self, path: &Path) -> Result<Vec<ImageRecord>, PipelineError>;

    /// Rasterise the given 1-indexed pages, one record per page with
    /// `image_num` 1. Pages that fail to render are skipped.
    fn render_pages(&self, path: &Path, pages: &[usize]) -> Result<Vec<ImageRecord>, PipelineError>;
}

/// A node of a page's object tree, as far as image discovery is concerned.
pub trait PageObjectNode {
    /// The image carried by this node, if it is an image object.
    fn image(&self) -> Option<Result<EmbeddedImage, String>>;

    /// Visit the direct children in content order. Only containers have any.
    fn for_each_child(&self, visit: &mut dyn FnMut(&dyn PageObjectNode));
}

/// Collect every image under `node`, depth-first in content order.
pub fn gather_images(node: &dyn PageObjectNode, out: &mut Vec<Result<EmbeddedImage, String>>) {
    if let Some(image) = node.image() {
        out.push(image);
        return;
    }
    node.for_each_child(&mut |child| gather_images(child, out));
}

impl PageObjectNode for PdfPageObject<'_> {
    fn image(&self) -> Option<Result<EmbeddedImage, String>> {
        self.as_image_object().map(decode_image_object)
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&dyn PageObjectNode)) {
        let Some(form) = self.as_x_object_form_object() else {
            return;
        };
        for idx in 0..form.len() {
            match form.get(idx) {
                Ok(child) => visit(&child),
                Err(e) => warn!("Skipping unreadable object {idx} inside form: {:?}", e),
            }
        }
    }
}

/// Keep a JPEG stream as-is when possible, otherwise let pdfium decode it.
fn decode_image_object(img: &PdfPageImageObject<'_>) -> Result<EmbeddedImage, String> {
    let filters: Vec<String> = img.filters().iter().map(|f| f.name().to_string()).collect();
    let names: Vec<&str> = filters.iter().map(String::as_str).collect();

    if let Some(media_type) = passthrough_media_type(&names) {
        match img.get_raw_image_data() {
            Ok(bytes) if !bytes.is_empty() => {
                return Ok(EmbeddedImage::Encoded { bytes, media_type });
            }
            Ok(_) => debug!("Empty {:?} stream, decoding instead", names),
            Err(e) => debug!("Raw {:?} stream unavailable, decoding instead: {:?}", names, e),
        }
    }

    img.get_raw_image()
        .map(EmbeddedImage::Bitmap)
        .map_err(|e| format!("{:?}", e))
}

/// [`DocumentBackend`] built on pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    lib_path: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumBackend {
    /// `lib_path` may name the library file itself or the directory holding it.
    pub fn new(lib_path: Option<PathBuf>, password: Option<String>) -> Self {
        Self { lib_path, password }
    }

    fn with_document<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;
        let document = open_document(&pdfium, path, self.password.as_deref())?;
        info!("PDF loaded: {} pages", document.pages().len());
        f(&document)
    }
}

impl DocumentBackend for PdfiumBackend {
    fn partition(&self, path: &Path) -> Result<Vec<TextBlock>, PipelineError> {
        self.with_document(path, |document| {
            let mut blocks = Vec::new();
            for (idx, page) in document.pages().iter().enumerate() {
                let page_num = idx + 1;
                let text = page.text().map_err(|e| PipelineError::PartitionFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;
                blocks.extend(split_blocks(page_num, &text.all()));
            }
            debug!("Partitioned into {} blocks", blocks.len());
            Ok(blocks)
        })
    }

    fn extract_images(&self, path: &Path) -> Result<Vec<ImageRecord>, PipelineError> {
        self.with_document(path, |document| {
            let mut images = Vec::new();
            for (idx, page) in document.pages().iter().enumerate() {
                let mut decoded = Vec::new();
                for object in page.objects().iter() {
                    gather_images(&object, &mut decoded);
                }
                collect_page_images(idx + 1, decoded, &mut images);
            }
            debug!("Extracted {} embedded images", images.len());
            Ok(images)
        })
    }

    fn render_pages(&self, path: &Path, pages: &[usize]) -> Result<Vec<ImageRecord>, PipelineError> {
        self.with_document(path, |document| {
            let render_config = PdfRenderConfig::new()
                .set_target_width(RENDER_TARGET_WIDTH)
                .set_maximum_height(RENDER_MAX_HEIGHT);
            let all_pages = document.pages();

            let mut rendered = Vec::with_capacity(pages.len());
            for &page_num in pages {
                let Some(index) = page_num
                    .checked_sub(1)
                    .and_then(|i| PdfPageIndex::try_from(i).ok())
                else {
                    warn!("Skipping page {}: not a valid page number", page_num);
                    continue;
                };
                let page = match all_pages.get(index) {
                    Ok(page) => page,
                    Err(e) => {
                        warn!("Skipping page {}: {:?}", page_num, e);
                        continue;
                    }
                };
                let image = match page.render_with_config(&render_config) {
                    Ok(bitmap) => bitmap.as_image(),
                    Err(e) => {
                        warn!("Failed to render page {}: {:?}", page_num, e);
                        continue;
                    }
                };
                debug!("Rendered page {} → {}x{} px", page_num, image.width(), image.height());
                match encode_image(&image, page_num, 1) {
                    Ok(record) => rendered.push(record),
                    Err(e) => warn!("Failed to encode rendered page {}: {}", page_num, e),
                }
            }
            Ok(rendered)
        })
    }
}

/// Bind to a pdfium library.
///
/// Search order: the configured path (file or directory), then the working
/// directory, then the system library path.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, PipelineError> {
    let bindings = match lib_path {
        Some(p) if p.is_file() => Pdfium::bind_to_library(p),
        Some(p) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| PipelineError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, PipelineError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            PipelineError::PasswordRequired {
                path: path.to_path_buf(),
            }
        } else {
            PipelineError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    /// In-memory page object tree.
    enum Node {
        Image(&'static str),
        Broken,
        Form(Vec<Node>),
        Text,
    }

    impl PageObjectNode for Node {
        fn image(&self) -> Option<Result<EmbeddedImage, String>> {
            match self {
                Node::Image(tag) => Some(Ok(EmbeddedImage::Encoded {
                    bytes: tag.as_bytes().to_vec(),
                    media_type: "image/jpeg",
                })),
                Node::Broken => Some(Err("undecodable".into())),
                Node::Form(_) | Node::Text => None,
            }
        }

        fn for_each_child(&self, visit: &mut dyn FnMut(&dyn PageObjectNode)) {
            if let Node::Form(children) = self {
                for child in children {
                    visit(child);
                }
            }
        }
    }

    fn tags(found: &[Result<EmbeddedImage, String>]) -> Vec<String> {
        found
            .iter()
            .map(|r| match r {
                Ok(EmbeddedImage::Encoded { bytes, .. }) => String::from_utf8_lossy(bytes).into_owned(),
                Ok(EmbeddedImage::Bitmap(_)) => "bitmap".into(),
                Err(_) => "err".into(),
            })
            .collect()
    }

    #[test]
    fn images_inside_forms_are_found_in_content_order() {
        let page = vec![
            Node::Image("a"),
            Node::Text,
            Node::Form(vec![Node::Image("b"), Node::Form(vec![Node::Image("c")]), Node::Text]),
            Node::Image("d"),
        ];
        let mut found = Vec::new();
        for object in &page {
            gather_images(object, &mut found);
        }
        assert_eq!(tags(&found), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn nested_failures_keep_their_slot() {
        let page = vec![Node::Form(vec![Node::Broken, Node::Image("x")])];
        let mut found = Vec::new();
        for object in &page {
            gather_images(object, &mut found);
        }

        let mut records = Vec::new();
        collect_page_images(1, found, &mut records);
        let nums: Vec<usize> = records.iter().map(|r| r.image_num).collect();
        assert_eq!(nums, vec![2]);
    }

    #[test]
    fn form_without_images_yields_nothing() {
        let mut found = Vec::new();
        gather_images(&Node::Form(vec![Node::Text, Node::Form(vec![])]), &mut found);
        assert!(found.is_empty());
    }

    #[test]
    fn bitmap_conversion_is_available_for_nodes() {
        let bitmap: EmbeddedImage =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]))).into();
        assert_eq!(tags(&[Ok(bitmap)]), vec!["bitmap"]);
    }

    #[test]
    fn binding_to_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let err = bind_pdfium(Some(dir.path())).err().expect("no library in an empty dir");
        assert!(matches!(err, PipelineError::PdfiumBindingFailed(_)));
    }

    #[test]
    fn garbage_file_is_reported_as_corrupt() {
        // Needs a pdfium library on the default search path.
        let Ok(pdfium) = bind_pdfium(None) else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pdf");
        std::fs::write(&path, b"%PDF-1.7 truncated").unwrap();

        let password = String::from("secret");
        let err = open_document(&pdfium, &path, Some(password.as_str()))
            .err()
            .expect("junk must not open");
        assert!(matches!(
            err,
            PipelineError::CorruptPdf { .. } | PipelineError::PasswordRequired { .. }
        ));
    }
}
