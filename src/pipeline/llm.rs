//! VLM interaction: the analyzer seam and its provider-backed implementation.
//!
//! The controller only knows [`DrawingAnalyzer`]: give it a decoded drawing,
//! get back analysis text or an [`InferenceError`]. [`VisionAnalyzer`] is the
//! real thing, one chat request per drawing to an `edgequake-llm` provider.
//! Tests plug in scripted analyzers instead.
//!
//! There is no retry loop here. A failed call surfaces as one error and the
//! operator decides whether to try the same drawing again.

use crate::config::AnalyzerConfig;
use crate::error::InferenceError;
use crate::pipeline::{encode, postprocess};
use crate::prompts::ENGINEERING_DRAWING_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use image::DynamicImage;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Something that can describe one engineering drawing.
pub trait DrawingAnalyzer: Send + Sync {
    /// Analyse `image` and return the analysis text.
    fn analyze(
        &self,
        image: &DynamicImage,
    ) -> impl Future<Output = Result<String, InferenceError>> + Send;
}

/// [`DrawingAnalyzer`] backed by a vision-capable LLM provider.
#[derive(Clone)]
pub struct VisionAnalyzer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
}

impl VisionAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalyzerConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }
}

impl std::fmt::Debug for VisionAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionAnalyzer")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.options.temperature)
            .field("max_tokens", &self.options.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DrawingAnalyzer for VisionAnalyzer {
    /// ## Message Layout
    ///
    /// 1. **System message**: the fixed engineering-drawing prompt
    /// 2. **User message**: the drawing as a base64 PNG attachment (empty text)
    async fn analyze(&self, image: &DynamicImage) -> Result<String, InferenceError> {
        let start = Instant::now();
        let image_data = encode::encode_drawing(image)?;

        let messages = vec![
            ChatMessage::system(ENGINEERING_DRAWING_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let call = self.provider.chat(&messages, Some(&self.options));
        let response = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Analysis request failed: {}", e);
                return Err(InferenceError::Provider {
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!("Analysis request timed out after {:?}", self.timeout);
                return Err(InferenceError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        debug!(
            "Analysis: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        finish_analysis(&response.content)
    }
}

/// Clean the raw answer; blank answers are an error, not an analysis.
fn finish_analysis(raw: &str) -> Result<String, InferenceError> {
    if raw.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(postprocess::clean_analysis(raw))
}

/// Build `CompletionOptions` from the analyzer config.
fn build_options(config: &AnalyzerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
