//! CLI binary for docextract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docextract::{
    extract_detailed, extract_to_file, ExtractionConfig, ExtractionProgressCallback,
    ExtractionStats, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar sized to the number of embedded images
/// plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.green/238}] {pos}/{len} images  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Describing {total_images} embedded images…"))
        ));
    }

    fn on_image_start(&self, page_num: usize, image_num: usize) {
        self.bar.set_message(format!("page {page_num} image {image_num}"));
    }

    fn on_image_complete(&self, page_num: usize, image_num: usize, caption_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3} image {:<3}  {}",
            green("✓"),
            page_num,
            image_num,
            dim(&format!("{caption_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, page_num: usize, image_num: usize, reason: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long reasons to keep output tidy.
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason
        };

        self.bar.println(format!(
            "  {} Page {:>3} image {:<3}  {}",
            red("✗"),
            page_num,
            image_num,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_images: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if total_images == 0 {
            return;
        }
        if failed == 0 {
            eprintln!(
                "{} {} images described",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images described  ({} failed)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a PDF (text + image descriptions) to stdout
  docextract report.pdf

  # Write to a file
  docextract report.pdf -o report.txt

  # Skip the vision model for embedded images (each image is still listed,
  # with a "not configured" placeholder)
  docextract --no-captions report.pdf

  # Leave pages without a text layer empty instead of OCR-ing them
  docextract --no-page-ocr scan.pdf

  # OCR a scanned image
  docextract receipt.jpg

  # Full per-image bookkeeping as JSON
  docextract --json report.pdf > result.json

SUPPORTED INPUTS:
  .pdf                                  text layer + embedded image captions
                                        (scanned pages OCR'd via the vision model)
  .png .jpg .jpeg .bmp .tiff .tif       direct OCR via the vision model

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key
  OPENAI_API_KEY          OpenAI API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (anthropic, openai, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         pdfium library file or directory
  RUST_LOG                Log filter (overrides --verbose / --quiet)

Without any API key, PDFs are still extracted; each embedded image is
listed with a "not configured" placeholder instead of a description.
"#;

/// Extract text from PDFs and images, describing embedded images with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract text from PDFs and images, describing embedded images with a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/image path or HTTP/HTTPS URL.
    input: String,

    /// Write extracted text to this file instead of stdout.
    #[arg(short, long, env = "DOCEXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. claude-3-7-sonnet-latest, gpt-4o).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: anthropic, openai, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Do not send embedded images to the vision model; they are listed with placeholders.
    #[arg(long, env = "DOCEXTRACT_NO_CAPTIONS")]
    no_captions: bool,

    /// Do not OCR PDF pages that have no text layer.
    #[arg(long, env = "DOCEXTRACT_NO_PAGE_OCR")]
    no_page_ocr: bool,

    /// Max LLM output tokens per image.
    #[arg(long, env = "DOCEXTRACT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Retries per image on LLM failure.
    #[arg(long, env = "DOCEXTRACT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_API_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCEXTRACT_PASSWORD")]
    password: Option<String>,

    /// pdfium library file or directory.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Text file replacing the built-in image description prompt.
    #[arg(long, env = "DOCEXTRACT_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Output the full ExtractionResult as JSON.
    #[arg(long, env = "DOCEXTRACT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCEXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let to_anyhow =
        |e: docextract::MediaProcessingError| anyhow::Error::new(e.source).context(e.message);

    let stats = match cli.output {
        Some(ref output_path) if !cli.json => {
            extract_to_file(&cli.input, output_path, &config)
                .await
                .map_err(to_anyhow)?
        }
        _ => {
            let result = extract_detailed(&cli.input, &config)
                .await
                .map_err(to_anyhow)?;

            if cli.json {
                let json =
                    serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(result.content.as_bytes())
                    .context("Failed to write to stdout")?;
                if !result.content.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
            result.stats
        }
    };

    if !cli.quiet && !cli.json {
        print_summary(&stats, cli.output.as_deref());
    }

    Ok(())
}

fn print_summary(stats: &ExtractionStats, output: Option<&Path>) {
    let mark = if stats.failed == 0 { green("✔") } else { cyan("⚠") };
    let target = output
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {}/{} images  {:.2}%  {}ms{}",
        mark,
        stats.succeeded,
        stats.total_images,
        stats.success_rate(),
        stats.duration_ms,
        target,
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .describe_images(!cli.no_captions)
        .ocr_scanned_pages(!cli.no_page_ocr)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.image_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
