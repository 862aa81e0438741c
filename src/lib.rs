//! # edgequake-drawings
//!
//! Extract the engineering drawings embedded in a PDF and have a Vision
//! Language Model (VLM) analyse them, one drawing at a time.
//!
//! ## How a session runs
//!
//! A session is one pass over one document. It is an explicit
//! [`SessionState`] advanced by [`Controller::tick`], one step per call:
//!
//! ```text
//! PDF
//!  │
//!  ├─ tick 1   extract embedded images via lopdf (spawn_blocking)
//!  ├─ tick 2   analyse drawing 1 ──┐
//!  ├─ tick 3   analyse drawing 2   │ one VLM call per tick, in document
//!  ├─ …                            │ order, at most 5 per session
//!  └─ tick n   analyse drawing n ──┘
//! ```
//!
//! Every tick returns a [`TickOutcome`]: the phase, status banners, the
//! accumulated results, and whether to tick again right away. A failed
//! drawing halts the session with the cursor unchanged; ticking again
//! retries the same drawing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_drawings::{open_upload, run_session, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = AnalyzerConfig::default();
//!     let upload = open_upload("bracket-assembly.pdf", config.download_timeout_secs).await?;
//!     let report = run_session(&upload, &config).await?;
//!     for result in &report.results {
//!         println!("## {}\n\n{}", result.label(), result.analysis);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `drawings` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-drawings = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AnalyzerConfig, AnalyzerConfigBuilder};
pub use controller::Controller;
pub use error::{AnalyzerError, DocumentError, ImageExtractionError, InferenceError, InputError};
pub use output::{
    AnalysisResult, Banner, Continuation, DrawingLabel, DrawingRecord, ExtractionSummary,
    ImageFormatHint, TickOutcome,
};
pub use pipeline::extract::{extract_drawings, Extraction};
pub use pipeline::input::{open_upload, Upload};
pub use pipeline::llm::{DrawingAnalyzer, VisionAnalyzer};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{drive_session, inspect, run_session, SessionReport};
pub use session::{Phase, SessionState, DRAWING_CAP};
pub use stream::{analyze_stream, session_stream, TickStream};
