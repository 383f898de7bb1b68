//! Embedded image encoding: pdfium image object → base64 [`ImageRecord`].
//!
//! JPEG streams (a lone `DCTDecode` filter) are forwarded byte-for-byte as
//! `image/jpeg`, so photos keep their native compression. Everything else,
//! including JPEG 2000 which vision APIs do not accept, is decoded by pdfium
//! and re-encoded as lossless PNG.
//!
//! A single bad image never fails the document: decode and encode errors are
//! logged and that image is skipped.

use crate::output::ImageRecord;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::fmt::Display;
use std::io::Cursor;
use tracing::{debug, warn};

/// Media type of re-encoded images.
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// Media type of passed-through DCT streams.
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// One embedded image as pulled from the document.
#[derive(Debug, Clone)]
pub enum EmbeddedImage {
    /// Already-encoded bytes that can be sent as they are.
    Encoded {
        bytes: Vec<u8>,
        media_type: &'static str,
    },
    /// A decoded raster that still needs encoding.
    Bitmap(DynamicImage),
}

impl From<DynamicImage> for EmbeddedImage {
    fn from(img: DynamicImage) -> Self {
        EmbeddedImage::Bitmap(img)
    }
}

/// Media type under which an image stream with these filters can be sent
/// without decoding, if any.
///
/// Only a single `DCTDecode` filter qualifies: a chain such as
/// `FlateDecode` + `DCTDecode` leaves the raw stream compressed.
pub fn passthrough_media_type(filters: &[&str]) -> Option<&'static str> {
    match filters {
        [only] if *only == "DCTDecode" => Some(JPEG_MEDIA_TYPE),
        _ => None,
    }
}

/// Encode a decoded image as a base64 PNG record.
pub fn encode_image(
    img: &DynamicImage,
    page_num: usize,
    image_num: usize,
) -> Result<ImageRecord, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    debug!(
        "Encoded page {} image {} ({}x{}) as PNG",
        page_num,
        image_num,
        img.width(),
        img.height(),
    );
    Ok(to_record(&buf, PNG_MEDIA_TYPE, page_num, image_num))
}

/// Turn an embedded image into a record, re-encoding only bitmaps.
pub fn encode_embedded(
    img: &EmbeddedImage,
    page_num: usize,
    image_num: usize,
) -> Result<ImageRecord, image::ImageError> {
    match img {
        EmbeddedImage::Encoded { bytes, media_type } => {
            debug!(
                "Passing through page {} image {} as {} ({} bytes)",
                page_num,
                image_num,
                media_type,
                bytes.len()
            );
            Ok(to_record(bytes, media_type, page_num, image_num))
        }
        EmbeddedImage::Bitmap(bitmap) => encode_image(bitmap, page_num, image_num),
    }
}

fn to_record(bytes: &[u8], media_type: &str, page_num: usize, image_num: usize) -> ImageRecord {
    ImageRecord {
        data: STANDARD.encode(bytes),
        media_type: media_type.to_string(),
        page_num,
        image_num,
    }
}

/// Encode every successfully decoded image of one page, appending to `out`.
///
/// `decoded` yields one entry per image object on the page, in page order.
/// Numbering follows that order, so a skipped image leaves a gap.
pub fn collect_page_images<T, E>(
    page_num: usize,
    decoded: impl IntoIterator<Item = Result<T, E>>,
    out: &mut Vec<ImageRecord>,
) where
    T: Into<EmbeddedImage>,
    E: Display,
{
    for (idx, result) in decoded.into_iter().enumerate() {
        let image_num = idx + 1;
        let img: EmbeddedImage = match result {
            Ok(img) => img.into(),
            Err(e) => {
                warn!("Failed to process image {image_num} on page {page_num}: {e}");
                continue;
            }
        };
        match encode_embedded(&img, page_num, image_num) {
            Ok(record) => out.push(record),
            Err(e) => warn!("Failed to process image {image_num} on page {page_num}: {e}"),
        }
    }
}
