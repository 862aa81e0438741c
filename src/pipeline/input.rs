//! Input resolution: turn a user-supplied path or URL into an in-memory
//! upload.
//!
//! The document is accepted on its name or MIME type alone. No structure
//! is checked here: a file called `*.pdf` that is not a PDF gets as far as
//! the extractor, which reports it as a [`crate::error::DocumentError`].

use crate::error::InputError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One uploaded document: a display name and its raw bytes.
#[derive(Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether a file name carries the `.pdf` extension (any case).
pub fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Whether a `Content-Type` value names a PDF.
pub fn is_pdf_mime(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|m| m.trim().eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false)
}

/// Resolve the input string to an in-memory upload.
///
/// URLs are downloaded; anything else is read as a local file.
pub async fn open_upload(input: &str, timeout_secs: u64) -> Result<Upload, InputError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Upload, InputError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(InputError::FileNotFound { path });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    if !has_pdf_extension(&name) {
        return Err(InputError::NotAPdf { name });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => InputError::PermissionDenied { path: path.clone() },
        std::io::ErrorKind::NotFound => InputError::FileNotFound { path: path.clone() },
        _ => InputError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(Upload::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Upload, InputError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            InputError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InputError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(InputError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let mime_says_pdf = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_pdf_mime);

    if !mime_says_pdf && !has_pdf_extension(&name) {
        return Err(InputError::NotAPdf { name });
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            InputError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InputError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(Upload::new(name, bytes.to_vec()))
}

/// Last non-empty path segment of a URL, or a fixed fallback.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
