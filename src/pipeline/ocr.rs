//! OCR through the vision describer: standalone image uploads, and PDF pages
//! rendered because they carry no text layer.
//!
//! The image is handed to the same vision describer used for captions, with a
//! transcription prompt instead of a description prompt. Unlike captioning
//! there is no useful placeholder for a failed transcription, so every
//! failure here is an error.

use crate::error::PipelineError;
use crate::output::ImageRecord;
use crate::pipeline::caption::ImageDescriber;
use crate::pipeline::images::encode_image;
use std::path::Path;
use tracing::debug;

/// Decode an image file and wrap it as a single-page [`ImageRecord`].
pub async fn load_image(path: &Path) -> Result<ImageRecord, PipelineError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::open(&owned).map_err(|e| PipelineError::ImageDecodeFailed {
            path: owned.clone(),
            detail: e.to_string(),
        })?;
        encode_image(&img, 1, 1).map_err(|e| PipelineError::ImageDecodeFailed {
            path: owned.clone(),
            detail: e.to_string(),
        })
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("Image decode task panicked: {}", e)))?
}

/// Transcribe the text in one image file.
pub async fn transcribe_image(
    path: &Path,
    describer: Option<&dyn ImageDescriber>,
    prompt: Option<&str>,
) -> Result<String, PipelineError> {
    let describer = describer.ok_or_else(|| PipelineError::ProviderNotConfigured {
        provider: "auto".to_string(),
        hint: "Image OCR needs a vision provider.\n\
               Set ANTHROPIC_API_KEY or OPENAI_API_KEY, or pass --provider."
            .to_string(),
    })?;
    let prompt = prompt.ok_or_else(|| PipelineError::InvalidConfig("OCR prompt is empty".into()))?;

    let record = load_image(path).await?;
    let text = transcribe_record(describer, prompt, &record).await?;
    debug!("Transcribed {} chars from {}", text.len(), path.display());
    Ok(text)
}

/// Transcribe an already-encoded image. The result is trimmed.
pub async fn transcribe_record(
    describer: &dyn ImageDescriber,
    prompt: &str,
    record: &ImageRecord,
) -> Result<String, PipelineError> {
    let text = describer.describe(record, prompt).await?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptionError;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};

    struct Echo;

    #[async_trait]
    impl ImageDescriber for Echo {
        async fn describe(&self, image: &ImageRecord, _prompt: &str) -> Result<String, CaptionError> {
            Ok(format!("  {} on page {}\n", image.media_type, image.page_num))
        }
    }

    fn write_png(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("scan.png");
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn transcription_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());
        let text = transcribe_image(&path, Some(&Echo), Some("read it")).await.unwrap();
        assert_eq!(text, "image/png on page 1");
    }

    #[tokio::test]
    async fn rendered_page_is_transcribed_as_is() {
        let record = ImageRecord {
            data: String::new(),
            media_type: "image/png".into(),
            page_num: 7,
            image_num: 1,
        };
        let text = transcribe_record(&Echo, "read it", &record).await.unwrap();
        assert_eq!(text, "image/png on page 7");
    }

    #[tokio::test]
    async fn missing_describer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path());
        let err = transcribe_image(&path, None, Some("read it")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ProviderNotConfigured { .. }));
    }

    #[tokio::test]
    async fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = transcribe_image(&path, Some(&Echo), Some("read it")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ImageDecodeFailed { .. }));
    }
}
