//! Streaming session API: one item per tick.
//!
//! Unlike the eager [`crate::run::run_session`], which returns only after
//! the controller halts, [`session_stream`] yields every [`TickOutcome`] as
//! soon as its tick finishes: first the extraction summary, then one
//! outcome per analysed drawing. The stream ends right after the first
//! outcome that asks to halt.
//!
//! Dropping the stream abandons the session.

use crate::config::AnalyzerConfig;
use crate::controller::Controller;
use crate::error::AnalyzerError;
use crate::output::TickOutcome;
use crate::pipeline::input::Upload;
use crate::pipeline::llm::{DrawingAnalyzer, VisionAnalyzer};
use crate::run::resolve_provider;
use crate::session::SessionState;
use futures::stream;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of tick outcomes.
pub type TickStream = Pin<Box<dyn Stream<Item = TickOutcome> + Send>>;

struct Driver<A> {
    controller: Controller<A>,
    upload: Upload,
    state: SessionState,
    halted: bool,
}

/// Tick `controller` over a fresh session for `upload`, one item per tick.
///
/// # Example
/// ```rust,no_run
/// use edgequake_drawings::{open_upload, session_stream, Controller, VisionAnalyzer, AnalyzerConfig};
/// use edgequake_drawings::run::resolve_provider;
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AnalyzerConfig::default();
/// let upload = open_upload("assembly.pdf", 120).await?;
/// let analyzer = VisionAnalyzer::new(resolve_provider(&config)?, &config);
/// let mut ticks = session_stream(upload, Controller::new(analyzer));
/// while let Some(tick) = ticks.next().await {
///     for result in &tick.results {
///         println!("{}: {} chars", result.label(), result.analysis.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn session_stream<A>(upload: Upload, controller: Controller<A>) -> TickStream
where
    A: DrawingAnalyzer + 'static,
{
    info!("Starting streaming session: {}", upload.name);

    let driver = Driver {
        controller,
        upload,
        state: SessionState::new(),
        halted: false,
    };

    let s = stream::unfold(driver, |mut d| async move {
        if d.halted {
            return None;
        }
        let outcome = d.controller.tick(&mut d.state, &d.upload.bytes).await;
        d.halted = !outcome.should_continue();
        Some((outcome, d))
    });

    Box::pin(s)
}

/// [`session_stream`] over the provider-backed analyzer resolved from
/// `config`.
///
/// # Errors
/// Fails before the first tick when no provider can be resolved.
pub fn analyze_stream(upload: Upload, config: &AnalyzerConfig) -> Result<TickStream, AnalyzerError> {
    let provider = resolve_provider(config)?;
    let controller = Controller::new(VisionAnalyzer::new(provider, config))
        .with_progress(config.progress_callback.clone());
    Ok(session_stream(upload, controller))
}
