//! Vision captioning: turn one extracted image into a description.
//!
//! Two layers live here:
//!
//! * [`ImageDescriber`] — the seam to a remote multimodal model. The default
//!   implementation, [`LlmDescriber`], wraps any `edgequake-llm` provider and
//!   adds per-attempt timeouts and exponential-backoff retries.
//!
//! * [`caption_image`] — the adapter the orchestrator calls. It never fails:
//!   every problem degrades to a [`Caption`] so each image can always be shown
//!   as *something*. `Caption::NoResult` is the one variant the orchestrator
//!   must treat as a failure.

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::{CaptionError, PipelineError};
use crate::output::ImageRecord;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// A remote model that can describe an image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Send `image` together with `prompt` and return the generated text.
    async fn describe(&self, image: &ImageRecord, prompt: &str) -> Result<String, CaptionError>;
}

/// What the adapter produced for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caption {
    /// The model described the image.
    Described(String),
    /// The model was unavailable or failed; the text says so for the reader.
    Placeholder(String),
    /// No caption could be produced at all.
    NoResult,
}

impl Caption {
    /// Text to show for this image, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Caption::Described(t) | Caption::Placeholder(t) => Some(t),
            Caption::NoResult => None,
        }
    }
}

/// Caption one image. Never returns an error.
///
/// | situation | result |
/// |-----------|--------|
/// | no describer configured | placeholder naming the page |
/// | prompt missing | [`Caption::NoResult`] |
/// | remote error / timeout | placeholder naming the page |
/// | empty response | placeholder naming the page |
pub async fn caption_image(
    describer: Option<&dyn ImageDescriber>,
    prompt: Option<&str>,
    image: &ImageRecord,
) -> Caption {
    let page = image.page_num;

    let Some(describer) = describer else {
        return Caption::Placeholder(format!(
            "[Claude API not configured for image on page {page}]"
        ));
    };

    let Some(prompt) = prompt else {
        warn!(page, image_num = image.image_num, "Failed to get image extraction prompt");
        return Caption::NoResult;
    };

    match describer.describe(image, prompt).await {
        Ok(text) if !text.trim().is_empty() => {
            debug!(page, image_num = image.image_num, "Caption: {} chars", text.len());
            Caption::Described(text)
        }
        Ok(_) | Err(CaptionError::EmptyResponse) => Caption::Placeholder(format!(
            "[No response received for image on page {page}]"
        )),
        Err(e) => {
            info!(page, image_num = image.image_num, "Failed to process image with vision model: {e}");
            Caption::Placeholder(format!("[Failed to process image on page {page}]"))
        }
    }
}

// ── LLM-backed describer ─────────────────────────────────────────────────

/// [`ImageDescriber`] backed by an `edgequake-llm` provider.
pub struct LlmDescriber {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    temperature: f32,
    max_retries: u32,
    retry_backoff_ms: u64,
    attempt_timeout: Duration,
}

impl LlmDescriber {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            attempt_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageDescriber for LlmDescriber {
    async fn describe(&self, image: &ImageRecord, prompt: &str) -> Result<String, CaptionError> {
        let image_data = ImageData::new(image.data.clone(), image.media_type.as_str());
        // One user turn carrying both the image and the instruction.
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
        let options = self.options();

        let mut last_err: Option<CaptionError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {} image {}: retry {}/{} after {}ms",
                    image.page_num, image.image_num, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let err = match timeout(self.attempt_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Page {} image {}: {} input tokens, {} output tokens",
                        image.page_num,
                        image.image_num,
                        response.prompt_tokens,
                        response.completion_tokens
                    );
                    if response.content.trim().is_empty() {
                        return Err(CaptionError::EmptyResponse);
                    }
                    return Ok(response.content);
                }
                Ok(Err(e)) => CaptionError::Llm {
                    retries: attempt,
                    detail: e.to_string(),
                },
                Err(_) => CaptionError::Timeout {
                    secs: self.attempt_timeout.as_secs(),
                },
            };
            warn!(
                "Page {} image {}: attempt {} failed — {}",
                image.page_num,
                image.image_num,
                attempt + 1,
                err
            );
            last_err = Some(err);
        }

        Err(last_err.unwrap_or(CaptionError::Llm {
            retries: self.max_retries,
            detail: "Unknown error".to_string(),
        }))
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the describer, from most-specific to least-specific.
///
/// 1. **Pre-built describer** (`config.describer`), used as-is.
/// 2. **Pre-built provider** (`config.provider`), wrapped in [`LlmDescriber`].
/// 3. **Named provider** (`config.provider_name` + optional model). Failing to
///    initialise a provider the caller asked for by name is an error.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Auto-detection** (`ProviderFactory::from_env`). If nothing is found
///    the result is `Ok(None)`: extraction still runs, with placeholders.
pub fn resolve_describer(
    config: &ExtractionConfig,
) -> Result<Option<Arc<dyn ImageDescriber>>, PipelineError> {
    if let Some(ref describer) = config.describer {
        return Ok(Some(Arc::clone(describer)));
    }

    let wrap = |p: Arc<dyn LLMProvider>| -> Arc<dyn ImageDescriber> {
        Arc::new(LlmDescriber::new(p, config))
    };

    if let Some(ref provider) = config.provider {
        return Ok(Some(wrap(Arc::clone(provider))));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model).map(|p| Some(wrap(p)));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model).map(|p| Some(wrap(p)));
        }
    }

    match ProviderFactory::from_env() {
        Ok((provider, _embedding)) => Ok(Some(wrap(provider))),
        Err(e) => {
            info!("No vision provider detected, images will not be described: {e}");
            Ok(None)
        }
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
