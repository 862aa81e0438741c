//! The sequential analysis controller.
//!
//! [`Controller::tick`] advances a [`SessionState`] by exactly one step and
//! returns a [`TickOutcome`] describing what to show. The first tick
//! extracts; every following tick analyses at most one drawing. The
//! outcome's [`Continuation`] tells the driver whether to tick again right
//! away or to wait for the operator.
//!
//! ```text
//!   Fresh ──extract──▶ Analyzing ──analyse × cap──▶ Done        (total ≤ 5)
//!     │                    │                    └─▶ IdleExcess  (total > 5)
//!     └─ unreadable ─┐     └─ failure: Halt, cursor unchanged
//!                    ▼
//!                  Fresh (Halt)
//! ```
//!
//! No error escapes a tick. Every failure becomes an error banner.

use crate::error::{DocumentError, InferenceError};
use crate::output::{AnalysisResult, Banner, Continuation, ExtractionSummary, TickOutcome};
use crate::pipeline::extract::{extract_drawings, Extraction};
use crate::pipeline::{encode, llm::DrawingAnalyzer};
use crate::progress::ProgressCallback;
use crate::session::{Phase, SessionState, DRAWING_CAP};
use image::DynamicImage;
use tracing::{debug, info, warn};

/// Drives one session, one tick at a time.
///
/// The controller holds no session data of its own, so one controller can
/// serve any number of sessions in turn.
pub struct Controller<A> {
    analyzer: A,
    progress: Option<ProgressCallback>,
}

impl<A: DrawingAnalyzer> Controller<A> {
    pub fn new(analyzer: A) -> Self {
        Self {
            analyzer,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Advance the session by one step.
    ///
    /// `document` is the uploaded file; it is only read while the session
    /// is `Fresh`.
    pub async fn tick(&self, state: &mut SessionState, document: &[u8]) -> TickOutcome {
        match state.phase() {
            Phase::Fresh => match self.extract(state, document).await {
                Ok(out) => out,
                Err(e) => outcome(state, Continuation::Halt, vec![Banner::Error(e.to_string())], None),
            },
            Phase::Analyzing => self.analysis_tick(state).await,
            Phase::Done | Phase::IdleExcess => idle_tick(state),
        }
    }

    /// The extraction step on its own, with the document error kept typed.
    ///
    /// [`Controller::tick`] calls this while the session is `Fresh` and turns
    /// an error into a banner. Drivers that want to stop on an unreadable
    /// document call it directly for the first step. On a session that is
    /// already extracted this is an idle tick.
    pub async fn extract(
        &self,
        state: &mut SessionState,
        document: &[u8],
    ) -> Result<TickOutcome, DocumentError> {
        if state.extracted() {
            return Ok(idle_tick(state));
        }
        info!("Extracting drawings from {} bytes", document.len());

        let extraction = run_extractor(document.to_vec()).await.inspect_err(|e| warn!("{}", e))?;

        let Extraction { drawings, warnings } = extraction;
        state.record_extraction(drawings);

        let total = state.total();
        let cap = state.cap();
        info!("Found {} drawing(s), analysing {}", total, cap);
        if let Some(cb) = &self.progress {
            cb.on_extraction_complete(total, cap);
        }

        let mut banners = vec![Banner::Success(format!("Found {total} drawings in the PDF!"))];
        banners.extend(warnings.iter().map(|w| Banner::Warning(w.to_string())));

        let summary = ExtractionSummary {
            total,
            labels: state.labels(),
        };

        let continuation = if cap > 0 {
            Continuation::Continue
        } else {
            Continuation::Halt
        };

        Ok(outcome(state, continuation, banners, Some(summary)))
    }

    async fn analysis_tick(&self, state: &mut SessionState) -> TickOutcome {
        let index = state.cursor();
        let cap = state.cap();
        let Some(record) = state.next_drawing() else {
            return idle_tick(state);
        };
        let label = record.label();
        let (page, drawing_number) = (record.page, record.drawing_number);

        debug!("Analysing {} ({}/{})", label, index + 1, cap);
        if let Some(cb) = &self.progress {
            cb.on_drawing_start(index, cap, label);
        }

        let analysed = self.analyse_one(&record.image_bytes).await;
        match analysed {
            Ok((image, analysis)) => {
                if let Some(cb) = &self.progress {
                    cb.on_drawing_complete(index, cap, label, analysis.len());
                }
                state.push_result(AnalysisResult {
                    page,
                    drawing_number,
                    image,
                    analysis,
                });
                info!("Analysed {} ({}/{})", label, state.cursor(), cap);

                if state.cursor() < cap {
                    outcome(state, Continuation::Continue, Vec::new(), None)
                } else {
                    if let Some(cb) = &self.progress {
                        cb.on_batch_complete(state.cursor(), state.total());
                    }
                    let banner =
                        Banner::Success(format!("Completed analysis of the first {cap} drawings!"));
                    outcome(state, Continuation::Halt, vec![banner], None)
                }
            }
            Err(e) => {
                warn!("Analysis of {} failed: {}", label, e);
                if let Some(cb) = &self.progress {
                    cb.on_drawing_error(index, cap, label, e.to_string());
                }
                outcome(
                    state,
                    Continuation::Halt,
                    vec![analysis_error_banner(&label.to_string(), &e)],
                    None,
                )
            }
        }
    }

    /// Decode one drawing and send it to the analyzer.
    async fn analyse_one(&self, bytes: &[u8]) -> Result<(DynamicImage, String), InferenceError> {
        let image = encode::decode_drawing(bytes)?;
        let analysis = self.analyzer.analyze(&image).await?;
        Ok((image, analysis))
    }
}

/// Nothing left to do: report, never mutate.
fn idle_tick(state: &SessionState) -> TickOutcome {
    let mut banners = Vec::new();
    if state.total() > state.cap() {
        banners.push(Banner::Info(format!(
            "First {DRAWING_CAP} drawings have been analyzed. {} more drawing(s) in this document \
             were not analyzed; start a new session to analyze a different set.",
            state.total() - state.cap()
        )));
    }
    outcome(state, Continuation::Halt, banners, None)
}

fn analysis_error_banner(label: &str, e: &InferenceError) -> Banner {
    Banner::Error(format!("Error analyzing {label}: {e}"))
}

/// Run the extractor on the blocking pool; a panicked task counts as an
/// unreadable document.
async fn run_extractor(document: Vec<u8>) -> Result<Extraction, DocumentError> {
    match tokio::task::spawn_blocking(move || extract_drawings(&document)).await {
        Ok(result) => result,
        Err(e) => Err(DocumentError::Unreadable {
            detail: format!("extraction task failed: {e}"),
        }),
    }
}

fn outcome(
    state: &SessionState,
    continuation: Continuation,
    banners: Vec<Banner>,
    summary: Option<ExtractionSummary>,
) -> TickOutcome {
    TickOutcome {
        phase: state.phase(),
        continuation,
        banners,
        summary,
        results: state.results().to_vec(),
    }
}
