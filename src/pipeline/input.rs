//! Input resolution: normalise a user-supplied path or URL to a local file
//! and decide which extraction path it takes.
//!
//! Only a fixed allow-list of extensions is accepted. PDFs additionally have
//! their magic bytes (`%PDF`) checked so callers get a clear error instead of
//! a pdfium failure deep in the pipeline.
//!
//! URL inputs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so cleanup happens automatically when the request ends.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Extensions routed to the direct image OCR path.
pub const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".bmp", ".tiff", ".tif"];

/// Extensions routed to the PDF pipeline.
pub const PDF_EXTENSIONS: &[&str] = &[".pdf"];

/// Which extraction path a file takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    /// Classify a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        if PDF_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileKind::Image)
        } else {
            Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext,
            })
        }
    }
}

/// A local path, or a downloaded temp file kept alive alongside it.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: FileKind },
    /// Input was a URL; the file lives in a temp directory kept alive here.
    Downloaded {
        path: PathBuf,
        kind: FileKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the local file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local, allow-listed file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PipelineError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Validate a local path: allow-listed extension, readable, PDF magic bytes.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, PipelineError> {
    let path = path.to_path_buf();
    let kind = FileKind::from_path(&path)?;

    if !path.exists() {
        return Err(PipelineError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == FileKind::Pdf {
                use std::io::Read;
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(PipelineError::NotAPdf { path, magic });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PipelineError::FileNotFound { path });
        }
    }

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PipelineError> {
    info!("Downloading document from: {}", url);

    let filename = filename_from_url(url);
    let kind = FileKind::from_path(Path::new(&filename))?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PipelineError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PipelineError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let temp_dir = TempDir::new().map_err(|e| PipelineError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PipelineError::Internal(format!("Failed to write temp file: {}", e)))?;

    if kind == FileKind::Pdf && bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PipelineError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment, or `downloaded.pdf` when the URL has none.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
