//! Pipeline stages for drawing extraction and analysis.
//!
//! Each submodule implements exactly one step. The controller strings them
//! together one drawing at a time.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ encode ──▶ llm ──▶ postprocess
//! (URL/path)  (lopdf)   (base64)   (VLM)   (cleanup)
//! ```
//!
//! 1. [`input`]: resolve the user-supplied path or URL to in-memory bytes
//! 2. [`extract`]: enumerate embedded raster images; pure and synchronous,
//!    so the controller runs it in `spawn_blocking`
//! 3. [`encode`]: decode drawing bytes, re-encode as a base64 PNG
//!    attachment for the multimodal request
//! 4. [`llm`]: the [`llm::DrawingAnalyzer`] seam and the VLM call; the
//!    only stage with network I/O besides URL download
//! 5. [`postprocess`]: deterministic cleanup of the analysis text

pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
