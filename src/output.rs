//! Data carried between the extractor, the controller and the render
//! surface.
//!
//! [`DrawingRecord`] is what the extractor produces, [`AnalysisResult`] is
//! what one successful analysis appends, and [`TickOutcome`] is the render
//! instruction returned by every [`crate::controller::Controller::tick`].

use crate::session::Phase;
use image::DynamicImage;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Page number and per-page drawing number of one drawing. Both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrawingLabel {
    pub page: u32,
    pub drawing_number: u32,
}

impl DrawingLabel {
    pub fn new(page: u32, drawing_number: u32) -> Self {
        Self {
            page,
            drawing_number,
        }
    }
}

impl fmt::Display for DrawingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Drawing {} on Page {}", self.drawing_number, self.page)
    }
}

/// What the extracted bytes of a drawing are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormatHint {
    /// `DCTDecode` stream, passed through untouched.
    Jpeg,
    /// `JPXDecode` stream, passed through untouched.
    Jpeg2000,
    /// Decompressed samples wrapped as a PNG by the extractor.
    Png,
}

/// One embedded raster image, as found in the document.
///
/// Immutable once created. The controller refers to records by index and
/// never copies their bytes into results.
#[derive(Clone, PartialEq, Eq)]
pub struct DrawingRecord {
    pub page: u32,
    pub drawing_number: u32,
    pub image_bytes: Vec<u8>,
    pub format: ImageFormatHint,
}

impl DrawingRecord {
    pub fn label(&self) -> DrawingLabel {
        DrawingLabel::new(self.page, self.drawing_number)
    }
}

impl fmt::Debug for DrawingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawingRecord")
            .field("page", &self.page)
            .field("drawing_number", &self.drawing_number)
            .field("image_bytes", &format_args!("<{} bytes>", self.image_bytes.len()))
            .field("format", &self.format)
            .finish()
    }
}

/// The analysis of one drawing.
///
/// Serialises without pixel data: the image appears as its width and height.
pub struct AnalysisResult {
    pub page: u32,
    pub drawing_number: u32,
    pub image: DynamicImage,
    pub analysis: String,
}

impl AnalysisResult {
    pub fn label(&self) -> DrawingLabel {
        DrawingLabel::new(self.page, self.drawing_number)
    }
}

impl fmt::Debug for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisResult")
            .field("page", &self.page)
            .field("drawing_number", &self.drawing_number)
            .field(
                "image",
                &format_args!("{}x{}", self.image.width(), self.image.height()),
            )
            .field("analysis_len", &self.analysis.len())
            .finish()
    }
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("AnalysisResult", 5)?;
        s.serialize_field("page", &self.page)?;
        s.serialize_field("drawing_number", &self.drawing_number)?;
        s.serialize_field("width", &self.image.width())?;
        s.serialize_field("height", &self.image.height())?;
        s.serialize_field("analysis", &self.analysis)?;
        s.end()
    }
}

/// Whether the driver should invoke `tick` again right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Continuation {
    /// More work is pending and needs no new external input.
    Continue,
    /// Wait for the operator (or stop): batch done, nothing to do, or a
    /// failure the operator must look at.
    Halt,
}

/// A transient status line for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum Banner {
    Success(String),
    Info(String),
    Warning(String),
    Error(String),
}

impl Banner {
    pub fn message(&self) -> &str {
        match self {
            Banner::Success(m) | Banner::Info(m) | Banner::Warning(m) | Banner::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Banner::Error(_))
    }
}

/// Summary emitted on the extraction tick: how many drawings, and which.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total: usize,
    pub labels: Vec<DrawingLabel>,
}

/// The render instruction produced by one tick.
///
/// `results` always carries the full accumulated list, so rendering every
/// outcome in turn shows the same results more than once; renderers that
/// only want new results can compare lengths.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub phase: Phase,
    pub continuation: Continuation,
    pub banners: Vec<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ExtractionSummary>,
    pub results: Vec<Arc<AnalysisResult>>,
}

impl TickOutcome {
    pub fn should_continue(&self) -> bool {
        self.continuation == Continuation::Continue
    }

    /// The first error banner, if any.
    pub fn error(&self) -> Option<&str> {
        self.banners.iter().find(|b| b.is_error()).map(Banner::message)
    }
}
