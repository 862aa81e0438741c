//! Progress-callback trait for per-drawing session events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalyzerConfigBuilder::progress_callback`] to be told
//! what the controller is doing on each tick.
//!
//! Events fire from inside [`crate::controller::Controller::tick`], on the
//! task that awaits the tick. Implementations must not block.
//!
//! # Example
//!
//! ```rust
//! use edgequake_drawings::{AnalysisProgressCallback, AnalyzerConfig, DrawingLabel};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_drawing_complete(&self, index: usize, cap: usize, label: DrawingLabel, len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} chars)", index + 1, cap, label, len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = AnalyzerConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::DrawingLabel;
use std::sync::Arc;

/// Called by the controller as it moves through a session.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is the 0-based position within the capped
/// batch and `cap` its size.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once, after extraction succeeded.
    ///
    /// # Arguments
    /// * `total`: drawings found in the document
    /// * `cap`: drawings that will be analysed this session
    fn on_extraction_complete(&self, total: usize, cap: usize) {
        let _ = (total, cap);
    }

    /// Called just before a drawing is sent to the model.
    fn on_drawing_start(&self, index: usize, cap: usize, label: DrawingLabel) {
        let _ = (index, cap, label);
    }

    /// Called when a drawing was analysed and its result appended.
    fn on_drawing_complete(&self, index: usize, cap: usize, label: DrawingLabel, analysis_len: usize) {
        let _ = (index, cap, label, analysis_len);
    }

    /// Called when a drawing could not be analysed. The controller halts
    /// after this event.
    ///
    /// `error` is owned so implementations can move it into spawned tasks.
    fn on_drawing_error(&self, index: usize, cap: usize, label: DrawingLabel, error: String) {
        let _ = (index, cap, label, error);
    }

    /// Called once when the capped batch has been fully analysed.
    ///
    /// # Arguments
    /// * `analyzed`: drawings analysed this session
    /// * `total`: drawings found in the document
    fn on_batch_complete(&self, analyzed: usize, total: usize) {
        let _ = (analyzed, total);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalyzerConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
