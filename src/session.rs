//! Session-scoped progress state.
//!
//! A session is one pass over one document. Everything the controller
//! needs to resume between ticks lives in [`SessionState`]; the controller
//! itself keeps nothing. Dropping the state abandons the session: results
//! already appended are all that remain.

use crate::output::{AnalysisResult, DrawingLabel, DrawingRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum number of drawings analysed in one session.
pub const DRAWING_CAP: usize = 5;

/// Where a session stands. Derived from [`SessionState`], never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Extraction has not run (or failed).
    Fresh,
    /// Some of the capped batch is still unanalysed.
    Analyzing,
    /// The whole document fit under the cap and has been analysed.
    Done,
    /// The capped batch is analysed but the document has more drawings.
    IdleExcess,
}

/// Progress of one session.
///
/// The cursor is not a separate counter: it is the number of results, so
/// `cursor == results.len()` cannot be broken.
#[derive(Debug, Default)]
pub struct SessionState {
    extracted: bool,
    drawings: Vec<DrawingRecord>,
    results: Vec<Arc<AnalysisResult>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extracted(&self) -> bool {
        self.extracted
    }

    /// Index of the next drawing to analyse within the capped batch.
    pub fn cursor(&self) -> usize {
        self.results.len()
    }

    /// Number of drawings this session will analyse: `min(5, total)`.
    pub fn cap(&self) -> usize {
        self.drawings.len().min(DRAWING_CAP)
    }

    pub fn total(&self) -> usize {
        self.drawings.len()
    }

    pub fn drawings(&self) -> &[DrawingRecord] {
        &self.drawings
    }

    pub fn results(&self) -> &[Arc<AnalysisResult>] {
        &self.results
    }

    pub fn labels(&self) -> Vec<DrawingLabel> {
        self.drawings.iter().map(DrawingRecord::label).collect()
    }

    pub fn phase(&self) -> Phase {
        if !self.extracted {
            Phase::Fresh
        } else if self.cursor() < self.cap() {
            Phase::Analyzing
        } else if self.total() > self.cap() {
            Phase::IdleExcess
        } else {
            Phase::Done
        }
    }

    /// The drawing the next analysing tick will work on.
    pub fn next_drawing(&self) -> Option<&DrawingRecord> {
        if self.phase() == Phase::Analyzing {
            self.drawings.get(self.cursor())
        } else {
            None
        }
    }

    /// Store the extraction output. Only the first call has any effect.
    pub(crate) fn record_extraction(&mut self, drawings: Vec<DrawingRecord>) {
        if self.extracted {
            return;
        }
        self.drawings = drawings;
        self.extracted = true;
    }

    /// Append the result for the drawing at the cursor, advancing it by one.
    ///
    /// Ignored when nothing is pending, so the cursor never passes the cap.
    pub(crate) fn push_result(&mut self, result: AnalysisResult) -> bool {
        if self.phase() != Phase::Analyzing {
            return false;
        }
        self.results.push(Arc::new(result));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ImageFormatHint;
    use image::{DynamicImage, GrayImage, Luma};

    fn records(n: u32) -> Vec<DrawingRecord> {
        (1..=n)
            .map(|i| DrawingRecord {
                page: 1,
                drawing_number: i,
                image_bytes: vec![i as u8],
                format: ImageFormatHint::Png,
            })
            .collect()
    }

    fn result_for(record: &DrawingRecord) -> AnalysisResult {
        AnalysisResult {
            page: record.page,
            drawing_number: record.drawing_number,
            image: DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([0]))),
            analysis: "ok".into(),
        }
    }

    #[test]
    fn new_session_is_fresh() {
        let state = SessionState::new();
        assert_eq!(state.phase(), Phase::Fresh);
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.cap(), 0);
        assert!(state.next_drawing().is_none());
    }

    #[test]
    fn cap_is_min_of_five_and_total() {
        let mut small = SessionState::new();
        small.record_extraction(records(3));
        assert_eq!(small.cap(), 3);

        let mut large = SessionState::new();
        large.record_extraction(records(8));
        assert_eq!(large.cap(), DRAWING_CAP);
    }

    #[test]
    fn empty_document_is_done_immediately() {
        let mut state = SessionState::new();
        state.record_extraction(Vec::new());
        assert_eq!(state.phase(), Phase::Done);
    }

    #[test]
    fn push_never_passes_the_cap() {
        let mut state = SessionState::new();
        state.record_extraction(records(7));
        let all = state.drawings().to_vec();
        for record in &all {
            state.push_result(result_for(record));
        }
        assert_eq!(state.cursor(), 5);
        assert_eq!(state.results().len(), 5);
        assert_eq!(state.phase(), Phase::IdleExcess);
        assert!(!state.push_result(result_for(&all[6])));
        assert_eq!(state.cursor(), 5);
    }

    #[test]
    fn second_extraction_is_ignored() {
        let mut state = SessionState::new();
        state.record_extraction(records(2));
        state.record_extraction(records(9));
        assert_eq!(state.total(), 2);
    }

    #[test]
    fn next_drawing_follows_cursor() {
        let mut state = SessionState::new();
        state.record_extraction(records(3));
        let first = state.next_drawing().cloned().unwrap();
        assert_eq!(first.drawing_number, 1);
        state.push_result(result_for(&first));
        assert_eq!(state.next_drawing().unwrap().drawing_number, 2);
    }
}
