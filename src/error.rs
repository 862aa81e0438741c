//! Error types for the edgequake-drawings library.
//!
//! Each failure is scoped to the smallest unit it can spoil:
//!
//! * [`InputError`]: the document could not even be obtained (missing
//!   file, not a PDF by name or MIME type, download failure).
//! * [`DocumentError`]: the bytes could not be opened as a PDF. Fatal to
//!   the session: extraction yields nothing and the user must supply
//!   another document.
//! * [`ImageExtractionError`]: one embedded image could not be read. The
//!   image is skipped, a warning is reported, extraction continues.
//! * [`InferenceError`]: one drawing could not be analysed. The session
//!   survives, but the controller stops advancing until the operator
//!   ticks again.
//! * [`AnalyzerError`]: fatal errors of the library entry points
//!   ([`crate::run::run_session`] and friends): bad configuration, no
//!   provider, or one of the fatal kinds above.
//!
//! Nothing here is retried automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the top-level entry points.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The input document could not be resolved.
    #[error(transparent)]
    Input(#[from] InputError),

    /// The input document could not be opened as a PDF.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while obtaining the uploaded document.
#[derive(Debug, Error)]
pub enum InputError {
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the file failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither the file name nor the MIME type says "PDF".
    #[error("'{name}' does not look like a PDF (expected a .pdf file or application/pdf)")]
    NotAPdf { name: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },
}

/// The document could not be opened or parsed.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// Header, trailer, cross-reference table or page tree is unreadable.
    #[error("Error extracting drawings: the document could not be opened as a PDF ({detail})")]
    Unreadable { detail: String },
}

/// One embedded image could not be extracted; it is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("Could not extract drawing {drawing_number} on page {page}: {reason}")]
pub struct ImageExtractionError {
    pub page: u32,
    pub drawing_number: u32,
    pub reason: String,
}

/// One drawing could not be analysed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum InferenceError {
    /// The drawing bytes are not an image the decoder understands.
    #[error("image could not be decoded: {detail}")]
    UndecodableImage { detail: String },

    /// Re-encoding the image for the request body failed.
    #[error("image could not be encoded for the request: {detail}")]
    Encode { detail: String },

    /// The provider returned an error (network, quota, auth, bad request).
    #[error("provider error: {detail}")]
    Provider { detail: String },

    /// The provider did not answer within the per-call timeout.
    #[error("no response within {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with nothing but whitespace.
    #[error("the model returned an empty analysis")]
    EmptyResponse,
}
