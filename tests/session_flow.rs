//! Session behaviour over real (in-memory) PDFs with a scripted analyzer.
//!
//! No network, no API key: these run everywhere.

mod common;

use common::{pdf_with_pages, Img, Scripted};
use edgequake_drawings::{
    drive_session, extract_drawings, session_stream, AnalysisProgressCallback, AnalyzerError,
    Banner, Continuation, Controller, DrawingLabel, ImageFormatHint, Phase, ProgressCallback,
    SessionState, Upload,
};
use futures::StreamExt;
use std::sync::{Arc, Mutex};

fn labels(pairs: &[(u32, u32)]) -> Vec<DrawingLabel> {
    pairs.iter().map(|&(p, n)| DrawingLabel::new(p, n)).collect()
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[test]
fn zero_images_is_an_empty_list() {
    let pdf = pdf_with_pages(&[&[], &[]]);
    let extraction = extract_drawings(&pdf).unwrap();
    assert!(extraction.drawings.is_empty());
    assert!(extraction.warnings.is_empty());
}

#[test]
fn numbering_restarts_on_every_page() {
    let pdf = pdf_with_pages(&[
        &[Img::Jpeg(10), Img::Jpeg(11), Img::Jpeg(12)],
        &[Img::Jpeg(20), Img::GrayFlate(21)],
    ]);
    let extraction = extract_drawings(&pdf).unwrap();
    let got: Vec<DrawingLabel> = extraction.drawings.iter().map(|d| d.label()).collect();
    assert_eq!(got, labels(&[(1, 1), (1, 2), (1, 3), (2, 1), (2, 2)]));
    assert_eq!(extraction.drawings[0].format, ImageFormatHint::Jpeg);
    assert_eq!(extraction.drawings[4].format, ImageFormatHint::Png);
}

#[test]
fn skipped_images_keep_their_numbers() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(10), Img::Fax, Img::Dangling, Img::Jpeg(13)]]);
    let extraction = extract_drawings(&pdf).unwrap();

    let got: Vec<DrawingLabel> = extraction.drawings.iter().map(|d| d.label()).collect();
    assert_eq!(got, labels(&[(1, 1), (1, 4)]));

    let skipped: Vec<u32> = extraction.warnings.iter().map(|w| w.drawing_number).collect();
    assert_eq!(skipped, vec![2, 3]);
    assert!(extraction.warnings[0].reason.contains("CCITTFaxDecode"));
}

#[test]
fn jpeg_bytes_pass_through_untouched() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(9)]]);
    let extraction = extract_drawings(&pdf).unwrap();
    let bytes = &extraction.drawings[0].image_bytes;
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(bytes).unwrap();
    assert_eq!(decoded.width(), 9);
}

// ── Sessions ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_plus_two_images_all_analysed_in_order() {
    let pdf = pdf_with_pages(&[
        &[Img::Jpeg(10), Img::Jpeg(11), Img::Jpeg(12)],
        &[Img::Jpeg(20), Img::Jpeg(21)],
    ]);
    let analyzer = Scripted::new();
    let controller = Controller::new(analyzer.clone());

    let report = drive_session(&controller, &Upload::new("plans.pdf", pdf))
        .await
        .unwrap();

    assert_eq!(report.phase, Phase::Done);
    assert_eq!(report.total, 5);
    assert_eq!(analyzer.widths(), vec![10, 11, 12, 20, 21]);

    let analysed: Vec<DrawingLabel> = report.results.iter().map(|r| r.label()).collect();
    assert_eq!(analysed, labels(&[(1, 1), (1, 2), (1, 3), (2, 1), (2, 2)]));
    assert!(report.results[3].analysis.contains("20 px wide"));

    assert_eq!(
        report.banners,
        vec![
            Banner::Success("Found 5 drawings in the PDF!".into()),
            Banner::Success("Completed analysis of the first 5 drawings!".into()),
        ]
    );
}

#[tokio::test]
async fn only_the_first_five_of_eight_are_analysed() {
    let pdf = pdf_with_pages(&[
        &[Img::Jpeg(10), Img::Jpeg(11), Img::Jpeg(12), Img::Jpeg(13)],
        &[Img::Jpeg(20), Img::Jpeg(21), Img::Jpeg(22), Img::Jpeg(23)],
    ]);
    let analyzer = Scripted::new();
    let controller = Controller::new(analyzer.clone());
    let mut state = SessionState::new();

    let mut outcome = controller.tick(&mut state, &pdf).await;
    assert_eq!(outcome.summary.as_ref().unwrap().total, 8);
    while outcome.should_continue() {
        outcome = controller.tick(&mut state, &pdf).await;
    }

    assert_eq!(outcome.phase, Phase::IdleExcess);
    assert_eq!(state.cursor(), 5);
    assert_eq!(analyzer.widths(), vec![10, 11, 12, 13, 20]);

    // Ticking again only reports; nothing is analysed or mutated.
    for _ in 0..2 {
        let idle = controller.tick(&mut state, &pdf).await;
        assert_eq!(idle.continuation, Continuation::Halt);
        assert_eq!(idle.results.len(), 5);
        assert!(matches!(idle.banners.as_slice(), [Banner::Info(m)] if m.contains("3 more")));
    }
    assert_eq!(analyzer.widths().len(), 5);
}

#[tokio::test]
async fn failure_halts_and_next_tick_retries_the_same_drawing() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(10), Img::Jpeg(11), Img::Jpeg(12), Img::Jpeg(13)]]);
    let analyzer = Scripted::failing_on(&[2]);
    let controller = Controller::new(analyzer.clone());
    let mut state = SessionState::new();

    let mut outcome = controller.tick(&mut state, &pdf).await;
    while outcome.should_continue() {
        outcome = controller.tick(&mut state, &pdf).await;
    }

    assert_eq!(outcome.phase, Phase::Analyzing);
    assert_eq!(state.cursor(), 2);
    assert_eq!(outcome.results.len(), 2);
    let error = outcome.error().unwrap();
    assert!(error.contains("Drawing 3 on Page 1"), "got: {error}");
    assert!(error.contains("503"));

    // Operator resumes: same drawing again, then on to the end.
    let mut outcome = controller.tick(&mut state, &pdf).await;
    assert!(outcome.error().is_none());
    while outcome.should_continue() {
        outcome = controller.tick(&mut state, &pdf).await;
    }
    assert_eq!(outcome.phase, Phase::Done);
    assert_eq!(analyzer.widths(), vec![10, 11, 12, 12, 13]);
}

#[tokio::test]
async fn fail_stop_ends_the_session_normally() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(10), Img::Jpeg(11)]]);
    let controller = Controller::new(Scripted::failing_on(&[0]));

    let report = drive_session(&controller, &Upload::new("plans.pdf", pdf))
        .await
        .expect("a failed drawing is reported, not returned as an error");

    assert!(report.halted_on_error());
    assert_eq!(report.phase, Phase::Analyzing);
    assert!(report.results.is_empty());
    assert!(report.last_error().unwrap().contains("Drawing 1 on Page 1"));
}

/// Records every progress event as a short line.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl AnalysisProgressCallback for Recorder {
    fn on_extraction_complete(&self, total: usize, cap: usize) {
        self.push(format!("extract {total} {cap}"));
    }
    fn on_drawing_start(&self, index: usize, _cap: usize, _label: DrawingLabel) {
        self.push(format!("start {index}"));
    }
    fn on_drawing_complete(&self, index: usize, _cap: usize, _label: DrawingLabel, _len: usize) {
        self.push(format!("done {index}"));
    }
    fn on_drawing_error(&self, index: usize, _cap: usize, label: DrawingLabel, _error: String) {
        self.push(format!("err {index} {label}"));
    }
    fn on_batch_complete(&self, analyzed: usize, total: usize) {
        self.push(format!("batch {analyzed} {total}"));
    }
}

#[tokio::test]
async fn progress_events_follow_the_session() {
    let images = [Img::Jpeg(10); 8];
    let pdf = pdf_with_pages(&[&images]);
    let recorder = Arc::new(Recorder::default());
    let controller = Controller::new(Scripted::failing_on(&[4]))
        .with_progress(Some(recorder.clone() as ProgressCallback));
    let mut state = SessionState::new();

    for _ in 0..20 {
        let outcome = controller.tick(&mut state, &pdf).await;
        assert_eq!(state.cursor(), outcome.results.len());
        assert!(state.cursor() <= state.cap());
    }

    assert_eq!(state.phase(), Phase::IdleExcess);
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "extract 8 5",
            "start 0",
            "done 0",
            "start 1",
            "done 1",
            "start 2",
            "done 2",
            "start 3",
            "done 3",
            "start 4",
            "err 4 Drawing 5 on Page 1",
            "start 4",
            "done 4",
            "batch 5 8",
        ]
    );
}

#[tokio::test]
async fn unreadable_document_never_starts_analysing() {
    let garbage = b"this is not really a pdf".to_vec();
    let analyzer = Scripted::new();
    let controller = Controller::new(analyzer.clone());
    let mut state = SessionState::new();

    for _ in 0..2 {
        let outcome = controller.tick(&mut state, &garbage).await;
        assert_eq!(outcome.phase, Phase::Fresh);
        assert_eq!(outcome.continuation, Continuation::Halt);
        assert!(outcome.error().is_some());
        assert!(!state.extracted());
        assert!(state.drawings().is_empty());
    }
    assert!(analyzer.widths().is_empty());

    let err = drive_session(&controller, &Upload::new("broken.pdf", garbage))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::Document(_)));
}

#[tokio::test]
async fn document_without_drawings_is_done_after_one_tick() {
    let pdf = pdf_with_pages(&[&[]]);
    let controller = Controller::new(Scripted::new());
    let mut state = SessionState::new();

    let outcome = controller.tick(&mut state, &pdf).await;
    assert_eq!(outcome.phase, Phase::Done);
    assert_eq!(outcome.continuation, Continuation::Halt);
    assert_eq!(
        outcome.banners,
        vec![Banner::Success("Found 0 drawings in the PDF!".into())]
    );
}

#[tokio::test]
async fn skipped_images_are_reported_as_warnings() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(10), Img::Fax], &[Img::Jpeg(20)]]);
    let controller = Controller::new(Scripted::new());
    let mut state = SessionState::new();

    let outcome = controller.tick(&mut state, &pdf).await;
    let warnings: Vec<&str> = outcome
        .banners
        .iter()
        .filter_map(|b| match b {
            Banner::Warning(m) => Some(m.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("Could not extract drawing 2 on page 1"));
    assert_eq!(
        outcome.summary.unwrap().labels,
        labels(&[(1, 1), (2, 1)])
    );
}

#[tokio::test]
async fn stream_yields_one_outcome_per_tick_and_ends_on_halt() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(10), Img::GrayFlate(11), Img::Jpeg(12)]]);
    let ticks: Vec<_> = session_stream(Upload::new("s.pdf", pdf), Controller::new(Scripted::new()))
        .collect()
        .await;

    assert_eq!(ticks.len(), 4);
    assert!(ticks[0].summary.is_some());
    assert!(ticks[..3].iter().all(|t| t.should_continue()));
    assert_eq!(ticks[3].continuation, Continuation::Halt);
    assert_eq!(ticks[3].results.len(), 3);
}

#[tokio::test]
async fn outcomes_serialise_without_pixels() {
    let pdf = pdf_with_pages(&[&[Img::Jpeg(10)]]);
    let controller = Controller::new(Scripted::new());
    let mut state = SessionState::new();
    controller.tick(&mut state, &pdf).await;
    let outcome = controller.tick(&mut state, &pdf).await;

    let json: serde_json::Value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["phase"], "done");
    assert_eq!(json["continuation"], "halt");
    assert_eq!(json["results"][0]["width"], 10);
    assert_eq!(json["results"][0]["height"], 4);
    assert_eq!(json["banners"][0]["level"], "success");
    assert!(json.get("summary").is_none());
}
