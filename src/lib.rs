//! edgecam - real-time edge-detection frame pipeline
//!
//! Acquires frames from a camera or file, runs each one through a
//! thresholded edge-detection transform, overlays a smoothed throughput
//! measurement, presents both streams, and optionally persists the
//! processed stream as Motion-JPEG AVI.
//!
//! # Architecture
//!
//! The core is `pipeline::PipelineLoop`: an explicit per-frame state machine
//! (`INIT -> RUNNING -> DRAINING -> TERMINATED`) that owns the iteration
//! sequence and the lifecycle of its collaborators. Everything at the edges
//! is a trait seam so hardware backends and test stubs swap freely:
//!
//! - `source`: frame acquisition (`FrameSource`; V4L2 and FFmpeg backends
//!   behind features, synthetic `stub://` source always available)
//! - `transform`: the edge-detection contract (`Transform`) and the default
//!   CPU Sobel backend
//! - `display`: presentation and input polling (`Presenter`)
//! - `record`: processed-stream persistence (`Recorder`, AVI/MJPEG)
//! - `meter` / `overlay` / `control`: rate measurement, fps annotation, and
//!   the shared live threshold

pub mod config;
pub mod control;
pub mod display;
pub mod frame;
pub mod meter;
pub mod overlay;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod transform;

pub use config::EdgecamConfig;
pub use control::{ThresholdControl, DEFAULT_THRESHOLD};
pub use display::{HeadlessPresenter, Presenter, PresenterEvent};
pub use frame::{Frame, GrayFrame, FRAME_CHANNELS};
pub use meter::{RateMeter, RATE_WINDOW};
pub use pipeline::{ExitReason, LoopState, PipelineLoop, PipelineReport, DEFAULT_POLL_TIMEOUT};
pub use record::{AviRecorder, Recorder, CODEC_TAG, DEFAULT_OUTPUT_PATH};
pub use source::{FrameSource, Selector, SourceInfo, SyntheticSource, FALLBACK_FPS};
pub use transform::{SobelCpu, Transform};

// -------------------- Fatal failure taxonomy --------------------

/// What made a run fatal. Open failures can only occur in INIT; processing
/// failures drain the loop immediately (no retry path exists).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    SourceOpen,
    RecorderOpen,
    Processing,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SourceOpen => "source-open",
            FailureKind::RecorderOpen => "recorder-open",
            FailureKind::Processing => "processing",
        }
    }
}

/// Typed fatal-failure payload carried inside `anyhow::Error`.
///
/// Callers that need the taxonomy (tests, exit-code mapping) downcast to
/// this; everything else treats it as an ordinary error.
#[derive(Clone, Debug)]
pub struct FatalFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FatalFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FatalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for FatalFailure {}

/// The failure kind of an error, when it carries one.
pub fn failure_kind(err: &anyhow::Error) -> Option<FailureKind> {
    err.downcast_ref::<FatalFailure>()
        .map(|failure| failure.kind)
}
