//! Configuration types for document extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Nothing is hardcoded: the pdfium
//! library location, the vision provider, and prompt overrides all come from
//! here (or from the environment when left unset).

use crate::error::PipelineError;
use crate::pipeline::caption::ImageDescriber;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when a provider is named without an explicit model.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-latest";

/// Environment variable naming a pdfium library file or directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Configuration for one extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use docextract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .provider_name("anthropic")
///     .max_tokens(2048)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Send embedded images to the vision model. Default: true.
    ///
    /// When false the pipeline behaves as if no provider were configured:
    /// every image still gets an outcome and a placeholder caption.
    pub describe_images: bool,

    /// Render and transcribe PDF pages that have no text layer. Default: true.
    ///
    /// Only takes effect when a vision provider is configured.
    pub ocr_scanned_pages: bool,

    /// LLM model identifier, e.g. "claude-3-7-sonnet-latest", "gpt-4o".
    pub model: Option<String>,

    /// LLM provider name (e.g. "anthropic", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed describer. Takes precedence over every provider field.
    pub describer: Option<Arc<dyn ImageDescriber>>,

    /// Maximum tokens the model may generate per image. Default: 8192.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Retries per vision call on a provider error. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Timeout for each vision call attempt, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// pdfium library file or directory. Falls back to `PDFIUM_LIB_PATH`.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Replacement for the built-in image description prompt.
    pub image_prompt: Option<String>,

    /// Replacement for the built-in OCR prompt.
    pub ocr_prompt: Option<String>,

    /// Receives per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            describe_images: true,
            ocr_scanned_pages: true,
            model: None,
            provider_name: None,
            provider: None,
            describer: None,
            max_tokens: 8192,
            temperature: 0.1,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            password: None,
            pdfium_lib_path: None,
            image_prompt: None,
            ocr_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("describe_images", &self.describe_images)
            .field("ocr_scanned_pages", &self.ocr_scanned_pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("describer", &self.describer.as_ref().map(|_| "<dyn ImageDescriber>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The pdfium location from config, else from `PDFIUM_LIB_PATH`.
    pub fn resolved_pdfium_path(&self) -> Option<PathBuf> {
        self.pdfium_lib_path.clone().or_else(|| {
            std::env::var(PDFIUM_LIB_PATH_ENV)
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn describe_images(mut self, v: bool) -> Self {
        self.config.describe_images = v;
        self
    }

    pub fn ocr_scanned_pages(mut self, v: bool) -> Self {
        self.config.ocr_scanned_pages = v;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn describer(mut self, describer: Arc<dyn ImageDescriber>) -> Self {
        self.config.describer = Some(describer);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn image_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.image_prompt = Some(prompt.into());
        self
    }

    pub fn ocr_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.ocr_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PipelineError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
