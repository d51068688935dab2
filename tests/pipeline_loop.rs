//! Pipeline state-machine tests with injected collaborators.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use edgecam::control::ThresholdControl;
use edgecam::display::{Presenter, PresenterEvent};
use edgecam::frame::{Frame, GrayFrame, FRAME_CHANNELS};
use edgecam::pipeline::{ExitReason, LoopState, PipelineLoop};
use edgecam::record::{AviRecorder, Recorder};
use edgecam::source::{FrameSource, Selector, SourceInfo, SyntheticSource};
use edgecam::transform::{SobelCpu, Transform};
use edgecam::{failure_kind, FailureKind};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

// ----------------------------------------------------------------------------
// Stub collaborators
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SourceProbe {
    reads: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

struct CountingSource {
    total: u64,
    fail_open: bool,
    probe: SourceProbe,
}

impl CountingSource {
    fn new(total: u64) -> (Self, SourceProbe) {
        let probe = SourceProbe::default();
        (
            Self {
                total,
                fail_open: false,
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn failing_open() -> Self {
        Self {
            total: 0,
            fail_open: true,
            probe: SourceProbe::default(),
        }
    }
}

impl FrameSource for CountingSource {
    fn open(&mut self) -> Result<()> {
        if self.fail_open {
            return Err(anyhow!("no such device"));
        }
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: WIDTH,
            height: HEIGHT,
            fps: 30,
        }
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if self.probe.reads.load(Ordering::SeqCst) >= self.total {
            return Ok(None);
        }
        let seq = self.probe.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let data = vec![seq as u8; (WIDTH * HEIGHT * FRAME_CHANNELS) as usize];
        Ok(Some(Frame::new(data, WIDTH, HEIGHT, seq)?))
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

/// Records (frame seq, threshold) per call.
#[derive(Clone, Default)]
struct TransformProbe {
    calls: Arc<Mutex<Vec<(u64, u8)>>>,
}

struct RecordingTransform {
    probe: TransformProbe,
    fail: bool,
}

impl RecordingTransform {
    fn new() -> (Self, TransformProbe) {
        let probe = TransformProbe::default();
        (
            Self {
                probe: probe.clone(),
                fail: false,
            },
            probe,
        )
    }

    fn failing() -> (Self, TransformProbe) {
        let probe = TransformProbe::default();
        (
            Self {
                probe: probe.clone(),
                fail: true,
            },
            probe,
        )
    }
}

impl Transform for RecordingTransform {
    fn name(&self) -> &'static str {
        "recording-stub"
    }

    fn apply(&mut self, frame: &Frame, threshold: u8) -> Result<GrayFrame> {
        self.probe
            .calls
            .lock()
            .unwrap()
            .push((frame.seq, threshold));
        if self.fail {
            return Err(anyhow!("device unavailable"));
        }
        GrayFrame::new(
            vec![0u8; (frame.width * frame.height) as usize],
            frame.width,
            frame.height,
        )
    }
}

#[derive(Clone, Default)]
struct PresenterProbe {
    presented: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

/// Quits after N presented frames; optionally moves the slider first.
struct ScriptedPresenter {
    quit_after: Option<u64>,
    set_threshold_after_first: Option<u8>,
    threshold: Option<ThresholdControl>,
    probe: PresenterProbe,
}

impl ScriptedPresenter {
    fn run_forever() -> (Self, PresenterProbe) {
        Self::quitting_after(u64::MAX)
    }

    fn quitting_after(frames: u64) -> (Self, PresenterProbe) {
        let probe = PresenterProbe::default();
        (
            Self {
                quit_after: Some(frames),
                set_threshold_after_first: None,
                threshold: None,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl Presenter for ScriptedPresenter {
    fn open(&mut self, _info: &SourceInfo, threshold: ThresholdControl) -> Result<()> {
        self.threshold = Some(threshold);
        Ok(())
    }

    fn present(&mut self, _original: &Frame, _processed: &GrayFrame) -> Result<()> {
        self.probe.presented.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<PresenterEvent> {
        let shown = self.probe.presented.load(Ordering::SeqCst);
        if shown == 1 {
            if let (Some(value), Some(control)) =
                (self.set_threshold_after_first, self.threshold.as_ref())
            {
                control.set(value);
            }
        }
        match self.quit_after {
            Some(limit) if shown >= limit => Ok(PresenterEvent::Quit),
            _ => Ok(PresenterEvent::None),
        }
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct RecorderProbe {
    opened: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    finalized: Arc<AtomicBool>,
}

struct MemoryRecorder {
    fail_open: bool,
    probe: RecorderProbe,
}

impl MemoryRecorder {
    fn new() -> (Self, RecorderProbe) {
        let probe = RecorderProbe::default();
        (
            Self {
                fail_open: false,
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn failing_open() -> (Self, RecorderProbe) {
        let probe = RecorderProbe::default();
        (
            Self {
                fail_open: true,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl Recorder for MemoryRecorder {
    fn open(&mut self, _info: &SourceInfo) -> Result<()> {
        if self.fail_open {
            return Err(anyhow!("cannot open output"));
        }
        self.probe.opened.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write_frame(&mut self, _frame: &GrayFrame) -> Result<()> {
        self.probe.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.probe.finalized.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn no_wait(pipeline: PipelineLoop) -> PipelineLoop {
    pipeline.with_poll_timeout(Duration::ZERO)
}

// ----------------------------------------------------------------------------
// State-machine properties
// ----------------------------------------------------------------------------

#[test]
fn processes_every_frame_exactly_once_in_order() {
    let (source, source_probe) = CountingSource::new(10);
    let (transform, transform_probe) = RecordingTransform::new();
    let (presenter, _) = ScriptedPresenter::run_forever();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        None,
        ThresholdControl::default(),
    ));
    let report = pipeline.run().expect("run");

    assert_eq!(report.reason, ExitReason::EndOfStream);
    assert_eq!(report.frames_processed, 10);
    assert_eq!(source_probe.reads.load(Ordering::SeqCst), 10);

    let calls = transform_probe.calls.lock().unwrap();
    let expected: Vec<(u64, u8)> = (1..=10).map(|seq| (seq, 100)).collect();
    assert_eq!(*calls, expected);
}

#[test]
fn quit_completes_the_in_flight_frame_first() {
    let (source, _) = CountingSource::new(100);
    let (transform, transform_probe) = RecordingTransform::new();
    let (presenter, presenter_probe) = ScriptedPresenter::quitting_after(1);
    let (recorder, recorder_probe) = MemoryRecorder::new();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        Some(Box::new(recorder)),
        ThresholdControl::default(),
    ));
    let report = pipeline.run().expect("run");

    // The frame in flight when quit arrived finished its whole iteration.
    assert_eq!(report.reason, ExitReason::Quit);
    assert_eq!(report.frames_processed, 1);
    assert_eq!(transform_probe.calls.lock().unwrap().len(), 1);
    assert_eq!(presenter_probe.presented.load(Ordering::SeqCst), 1);
    assert_eq!(recorder_probe.frames.load(Ordering::SeqCst), 1);
    assert!(recorder_probe.finalized.load(Ordering::SeqCst));
    assert_eq!(pipeline.state(), LoopState::Terminated);
}

#[test]
fn recorder_open_failure_never_enters_running() {
    let (source, source_probe) = CountingSource::new(10);
    let (transform, transform_probe) = RecordingTransform::new();
    let (presenter, presenter_probe) = ScriptedPresenter::run_forever();
    let (recorder, recorder_probe) = MemoryRecorder::failing_open();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        Some(Box::new(recorder)),
        ThresholdControl::default(),
    ));
    let err = pipeline.run().expect_err("recorder open must be fatal");

    assert_eq!(failure_kind(&err), Some(FailureKind::RecorderOpen));
    assert_eq!(source_probe.reads.load(Ordering::SeqCst), 0);
    assert!(transform_probe.calls.lock().unwrap().is_empty());
    assert!(!recorder_probe.opened.load(Ordering::SeqCst));
    // The source had been opened before the recorder failed; it was released.
    assert!(source_probe.closed.load(Ordering::SeqCst));
    assert!(!presenter_probe.closed.load(Ordering::SeqCst));
    assert_eq!(pipeline.state(), LoopState::Terminated);
}

#[test]
fn source_open_failure_is_fatal_configuration_error() {
    let (transform, transform_probe) = RecordingTransform::new();
    let (presenter, _) = ScriptedPresenter::run_forever();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(CountingSource::failing_open()),
        Box::new(transform),
        Box::new(presenter),
        None,
        ThresholdControl::default(),
    ));
    let err = pipeline.run().expect_err("source open must be fatal");

    assert_eq!(failure_kind(&err), Some(FailureKind::SourceOpen));
    assert!(transform_probe.calls.lock().unwrap().is_empty());
    assert_eq!(pipeline.state(), LoopState::Terminated);
}

#[test]
fn processing_failure_drains_and_releases() {
    let (source, source_probe) = CountingSource::new(10);
    let (transform, transform_probe) = RecordingTransform::failing();
    let (presenter, presenter_probe) = ScriptedPresenter::run_forever();
    let (recorder, recorder_probe) = MemoryRecorder::new();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        Some(Box::new(recorder)),
        ThresholdControl::default(),
    ));
    let err = pipeline.run().expect_err("processing must be fatal");

    assert_eq!(failure_kind(&err), Some(FailureKind::Processing));
    // Exactly one attempt: no retry, no second frame.
    assert_eq!(transform_probe.calls.lock().unwrap().len(), 1);
    assert_eq!(source_probe.reads.load(Ordering::SeqCst), 1);
    assert!(source_probe.closed.load(Ordering::SeqCst));
    assert!(recorder_probe.finalized.load(Ordering::SeqCst));
    assert!(presenter_probe.closed.load(Ordering::SeqCst));
    assert_eq!(pipeline.state(), LoopState::Terminated);
}

#[test]
fn threshold_changes_apply_from_the_next_frame() {
    let (source, _) = CountingSource::new(3);
    let (transform, transform_probe) = RecordingTransform::new();
    let (mut presenter, _) = ScriptedPresenter::run_forever();
    presenter.set_threshold_after_first = Some(42);

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        None,
        ThresholdControl::default(),
    ));
    pipeline.run().expect("run");

    let calls = transform_probe.calls.lock().unwrap();
    assert_eq!(*calls, vec![(1, 100), (2, 42), (3, 42)]);
}

// ----------------------------------------------------------------------------
// End-to-end scenarios
// ----------------------------------------------------------------------------

#[test]
fn camera_default_three_frames_no_persistence() {
    // Camera-default selector parses, the (injected) source yields 3 frames
    // then end-of-stream, threshold stays at the default.
    assert_eq!(Selector::parse(None).unwrap(), Selector::Camera(0));

    let (source, _) = CountingSource::new(3);
    let (transform, transform_probe) = RecordingTransform::new();
    let (presenter, _) = ScriptedPresenter::run_forever();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        None,
        ThresholdControl::default(),
    ));
    let report = pipeline.run().expect("run");

    assert_eq!(report.reason, ExitReason::EndOfStream);
    assert_eq!(report.frames_processed, 3);
    let calls = transform_probe.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|&(_, threshold)| threshold == 100));
}

#[test]
fn file_selector_with_failing_recorder_reads_nothing() {
    let (source, source_probe) = CountingSource::new(10);
    let (transform, _) = RecordingTransform::new();
    let (presenter, _) = ScriptedPresenter::run_forever();
    let (recorder, _) = MemoryRecorder::failing_open();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(transform),
        Box::new(presenter),
        Some(Box::new(recorder)),
        ThresholdControl::default(),
    ));
    let err = pipeline.run().expect_err("must fail");

    assert_eq!(failure_kind(&err), Some(FailureKind::RecorderOpen));
    assert_eq!(source_probe.reads.load(Ordering::SeqCst), 0);
}

#[test]
fn synthetic_stream_through_real_collaborators() {
    use edgecam::config::CaptureSettings;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.avi");

    let capture = CaptureSettings {
        width: 64,
        height: 48,
        target_fps: 30,
        stub_frames: Some(3),
    };
    let source = SyntheticSource::new("stub://e2e".into(), capture);
    let (presenter, _) = ScriptedPresenter::run_forever();

    let mut pipeline = no_wait(PipelineLoop::new(
        Box::new(source),
        Box::new(SobelCpu::new()),
        Box::new(presenter),
        Some(Box::new(AviRecorder::new(&path))),
        ThresholdControl::default(),
    ));
    let report = pipeline.run().expect("run");

    assert_eq!(report.reason, ExitReason::EndOfStream);
    assert_eq!(report.frames_processed, 3);

    let bytes = std::fs::read(&path).expect("recorded file");
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"AVI ");
    // Finalized header carries the real frame count.
    assert_eq!(u32::from_le_bytes(bytes[48..52].try_into().unwrap()), 3);
}
