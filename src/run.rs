//! Eager session entry points.
//!
//! [`run_session`] resolves a provider, then ticks the controller until it
//! asks to halt, and returns everything the session produced. Use
//! [`crate::stream::session_stream`] instead to see each tick as it happens.

use crate::config::AnalyzerConfig;
use crate::controller::Controller;
use crate::error::{AnalyzerError, DocumentError};
use crate::output::{AnalysisResult, Banner, DrawingLabel, TickOutcome};
use crate::pipeline::extract::{extract_drawings, Extraction};
use crate::pipeline::input::Upload;
use crate::pipeline::llm::{DrawingAnalyzer, VisionAnalyzer};
use crate::session::{Phase, SessionState};
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// What one session produced, after the controller halted.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub phase: Phase,
    /// Drawings found in the document.
    pub total: usize,
    pub labels: Vec<DrawingLabel>,
    pub results: Vec<Arc<AnalysisResult>>,
    /// Every banner of every tick, in order.
    pub banners: Vec<Banner>,
    pub duration_ms: u64,
}

impl SessionReport {
    /// True when the session stopped on a failed drawing.
    pub fn halted_on_error(&self) -> bool {
        self.phase == Phase::Analyzing
    }

    /// The last error banner, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.banners.iter().rev().find(|b| b.is_error()).map(Banner::message)
    }
}

/// Analyse the drawings of one uploaded document.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(SessionReport)` once the controller halts: the batch is complete,
/// the document has no drawings, or a drawing failed (check
/// [`SessionReport::halted_on_error`]).
///
/// # Errors
/// - no provider could be resolved
/// - the document cannot be opened as a PDF
pub async fn run_session(
    upload: &Upload,
    config: &AnalyzerConfig,
) -> Result<SessionReport, AnalyzerError> {
    let provider = resolve_provider(config)?;
    let controller = Controller::new(VisionAnalyzer::new(provider, config))
        .with_progress(config.progress_callback.clone());
    drive_session(&controller, upload).await
}

/// Tick `controller` over a fresh session until it halts.
///
/// Generic over the analyzer so any [`DrawingAnalyzer`] can be driven the
/// same way [`run_session`] drives the provider-backed one.
pub async fn drive_session<A: DrawingAnalyzer>(
    controller: &Controller<A>,
    upload: &Upload,
) -> Result<SessionReport, AnalyzerError> {
    let start = Instant::now();
    info!("Starting session: {}", upload.name);

    let mut state = SessionState::new();
    let mut outcome = controller.extract(&mut state, &upload.bytes).await?;
    let mut banners = outcome.banners.clone();

    while outcome.should_continue() {
        outcome = controller.tick(&mut state, &upload.bytes).await;
        banners.extend(outcome.banners.iter().cloned());
    }

    let report = finish(&state, outcome, banners, start);
    info!(
        "Session complete: {}/{} drawings analysed, {}ms",
        report.results.len(),
        report.total,
        report.duration_ms
    );
    Ok(report)
}

fn finish(
    state: &SessionState,
    last: TickOutcome,
    banners: Vec<Banner>,
    start: Instant,
) -> SessionReport {
    SessionReport {
        phase: last.phase,
        total: state.total(),
        labels: state.labels(),
        results: last.results,
        banners,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// List the drawings of a document without analysing them.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(bytes: &[u8]) -> Result<Extraction, DocumentError> {
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || extract_drawings(&bytes))
        .await
        .map_err(|e| DocumentError::Unreadable {
            detail: format!("extraction task failed: {e}"),
        })?
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Default vision model for a provider named without a model.
fn default_model(provider_name: &str) -> &'static str {
    match provider_name {
        "gemini" | "google" => "gemini-2.0-flash",
        "anthropic" => "claude-sonnet-4-20250514",
        "ollama" => "llava",
        _ => "gpt-4.1-mini",
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalyzerError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzerError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`GEMINI_API_KEY`**, then **`OPENAI_API_KEY`**, with their default
///    vision models unless `config.model` says otherwise.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Called once, before the session starts: a missing key is reported before
/// any document is read.
pub fn resolve_provider(config: &AnalyzerConfig) -> Result<Arc<dyn LLMProvider>, AnalyzerError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or_else(|| default_model(name));
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        env_non_empty("EDGEQUAKE_LLM_PROVIDER"),
        env_non_empty("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    for (key, provider_name) in [("GEMINI_API_KEY", "gemini"), ("OPENAI_API_KEY", "openai")] {
        if env_non_empty(key).is_some() {
            let model = config
                .model
                .as_deref()
                .unwrap_or_else(|| default_model(provider_name));
            return create_vision_provider(provider_name, model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalyzerError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
