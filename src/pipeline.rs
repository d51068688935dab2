//! The frame pipeline and its control discipline.
//!
//! A single logical thread drives acquisition, transform dispatch,
//! measurement, presentation, and persistence strictly in sequence: frame N
//! finishes its whole iteration before frame N+1 is acquired. The loop is an
//! explicit state machine so every termination condition (end-of-stream,
//! quit, fatal failure) is a first-class transition rather than a `break`
//! buried in a busy loop.
//!
//! States: `INIT -> RUNNING -> DRAINING -> TERMINATED`. Collaborator open
//! failures abort in INIT before any frame is read; a quit event takes
//! effect at the iteration boundary, never preempting a mid-flight
//! transform; DRAINING releases every handle that was opened, on the error
//! path too.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::control::ThresholdControl;
use crate::display::{Presenter, PresenterEvent};
use crate::meter::RateMeter;
use crate::overlay;
use crate::record::Recorder;
use crate::source::FrameSource;
use crate::transform::Transform;
use crate::{FailureKind, FatalFailure};

/// Default bound on the per-iteration quit poll (one display refresh tick).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Lifecycle of a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Draining,
    Terminated,
}

/// Why a run ended normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// User quit via the presenter.
    Quit,
    /// The source ran out of frames.
    EndOfStream,
}

/// Summary of a completed run.
#[derive(Clone, Copy, Debug)]
pub struct PipelineReport {
    pub reason: ExitReason,
    /// Frames that completed the full iteration (one transform call each).
    pub frames_processed: u64,
}

/// Owns the collaborators and drives the per-frame state machine.
pub struct PipelineLoop {
    source: Box<dyn FrameSource>,
    transform: Box<dyn Transform>,
    presenter: Box<dyn Presenter>,
    recorder: Option<Box<dyn Recorder>>,
    threshold: ThresholdControl,
    meter: RateMeter,
    poll_timeout: Duration,
    state: LoopState,
    frames_processed: u64,
    source_opened: bool,
    recorder_opened: bool,
    presenter_opened: bool,
}

impl PipelineLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        transform: Box<dyn Transform>,
        presenter: Box<dyn Presenter>,
        recorder: Option<Box<dyn Recorder>>,
        threshold: ThresholdControl,
    ) -> Self {
        Self {
            source,
            transform,
            presenter,
            recorder,
            threshold,
            meter: RateMeter::new(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            state: LoopState::Init,
            frames_processed: 0,
            source_opened: false,
            recorder_opened: false,
            presenter_opened: false,
        }
    }

    /// Override the quit-poll bound (tests use zero to avoid sleeping).
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Drive the pipeline from INIT to TERMINATED.
    ///
    /// Returns the run summary on quit or end-of-stream; any fatal failure
    /// is returned after the drain released every opened handle.
    pub fn run(&mut self) -> Result<PipelineReport> {
        if let Err(err) = self.init() {
            if let Err(release_err) = self.release() {
                log::warn!("release after failed init: {release_err:#}");
            }
            self.state = LoopState::Terminated;
            return Err(err);
        }

        self.state = LoopState::Running;
        log::info!(
            "pipeline running: transform={}, recording={}",
            self.transform.name(),
            self.recorder.is_some()
        );

        let outcome = loop {
            match self.running_step() {
                Ok(None) => continue,
                Ok(Some(reason)) => break Ok(reason),
                Err(err) => break Err(err),
            }
        };

        self.state = LoopState::Draining;
        let drained = self.release();
        self.state = LoopState::Terminated;

        match outcome {
            Ok(reason) => {
                drained?;
                log::info!(
                    "pipeline terminated: {:?} after {} frames",
                    reason,
                    self.frames_processed
                );
                Ok(PipelineReport {
                    reason,
                    frames_processed: self.frames_processed,
                })
            }
            Err(err) => {
                if let Err(drain_err) = drained {
                    log::warn!("drain after failure: {drain_err:#}");
                }
                Err(err)
            }
        }
    }

    fn init(&mut self) -> Result<()> {
        self.source
            .open()
            .map_err(|err| FatalFailure::new(FailureKind::SourceOpen, format!("{err:#}")))?;
        self.source_opened = true;
        let info = self.source.info();

        if let Some(recorder) = self.recorder.as_mut() {
            recorder
                .open(&info)
                .map_err(|err| FatalFailure::new(FailureKind::RecorderOpen, format!("{err:#}")))?;
            self.recorder_opened = true;
        }

        self.presenter.open(&info, self.threshold.clone())?;
        self.presenter_opened = true;

        self.transform.warm_up().map_err(|err| {
            FatalFailure::new(
                FailureKind::Processing,
                format!("{} warm-up: {err:#}", self.transform.name()),
            )
        })?;
        Ok(())
    }

    /// One RUNNING iteration. `Ok(Some(_))` requests the transition to
    /// DRAINING; `Ok(None)` continues.
    fn running_step(&mut self) -> Result<Option<ExitReason>> {
        let Some(mut frame) = self.source.read()? else {
            return Ok(Some(ExitReason::EndOfStream));
        };

        // The threshold is read exactly once per iteration.
        let threshold = self.threshold.get();

        let processed = self.transform.apply(&frame, threshold).map_err(|err| {
            FatalFailure::new(
                FailureKind::Processing,
                format!(
                    "{} failed on frame {}: {err:#}",
                    self.transform.name(),
                    frame.seq
                ),
            )
        })?;
        if !processed.matches_dimensions(&frame) {
            return Err(FatalFailure::new(
                FailureKind::Processing,
                format!(
                    "{} returned {}x{} for a {}x{} frame",
                    self.transform.name(),
                    processed.width,
                    processed.height,
                    frame.width,
                    frame.height
                ),
            )
            .into());
        }

        let rate = self.meter.tick();
        overlay::stamp_rate(&mut frame, rate);

        self.presenter.present(&frame, &processed)?;

        if let Some(recorder) = self.recorder.as_mut() {
            recorder
                .write_frame(&processed)
                .with_context(|| format!("persist frame {}", frame.seq))?;
        }

        self.frames_processed += 1;

        // The in-flight frame is fully through the pipeline before the quit
        // signal is allowed to take effect.
        match self.presenter.poll(self.poll_timeout)? {
            PresenterEvent::Quit => Ok(Some(ExitReason::Quit)),
            PresenterEvent::None => Ok(None),
        }
    }

    /// Release whatever INIT managed to open, in acquisition order.
    fn release(&mut self) -> Result<()> {
        if self.source_opened {
            self.source.close();
            self.source_opened = false;
        }

        let mut result = Ok(());
        if self.recorder_opened {
            if let Some(recorder) = self.recorder.as_mut() {
                result = recorder.finalize().context("finalize recorder");
            }
            self.recorder_opened = false;
        }

        if self.presenter_opened {
            self.presenter.close();
            self.presenter_opened = false;
        }
        result
    }
}
