//! Presentation seam.
//!
//! The pipeline talks to a `Presenter` for everything user-facing: showing
//! the two streams, exposing the threshold slider, and polling for the quit
//! signal. The default build ships a headless presenter (no windowing
//! stack); it keeps the pipeline observable through logs and maps an
//! interrupt (Ctrl-C) to the quit event that a windowed presenter would
//! deliver for the `q` key.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::control::ThresholdControl;
use crate::frame::{Frame, GrayFrame};
use crate::source::SourceInfo;

/// Outcome of one bounded quit poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenterEvent {
    /// Nothing happened; keep running.
    None,
    /// User asked to stop (quit key or interrupt).
    Quit,
}

/// Renders both streams and relays user input.
pub trait Presenter {
    /// Create windows/controls. The threshold handle is the live slider
    /// binding; presenters without a slider simply hold it.
    fn open(&mut self, info: &SourceInfo, threshold: ThresholdControl) -> Result<()>;

    /// Show the annotated original and the processed stream.
    fn present(&mut self, original: &Frame, processed: &GrayFrame) -> Result<()>;

    /// Bounded wait for user input, at most `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<PresenterEvent>;

    /// Tear down windows/controls.
    fn close(&mut self);
}

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(2);

/// Headless presenter: logs instead of rendering, quits on Ctrl-C.
pub struct HeadlessPresenter {
    quit: Option<Arc<AtomicBool>>,
    threshold: Option<ThresholdControl>,
    last_status: Instant,
    frames_shown: u64,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self {
            quit: None,
            threshold: None,
            last_status: Instant::now(),
            frames_shown: 0,
        }
    }
}

impl Default for HeadlessPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for HeadlessPresenter {
    fn open(&mut self, info: &SourceInfo, threshold: ThresholdControl) -> Result<()> {
        self.quit = Some(interrupt_flag()?);
        self.threshold = Some(threshold);
        self.last_status = Instant::now();
        log::info!(
            "HeadlessPresenter: {}x{} @ {} fps (no window; press Ctrl-C to quit)",
            info.width,
            info.height,
            info.fps
        );
        Ok(())
    }

    fn present(&mut self, original: &Frame, processed: &GrayFrame) -> Result<()> {
        self.frames_shown += 1;
        if self.last_status.elapsed() >= STATUS_LOG_INTERVAL {
            let threshold = self
                .threshold
                .as_ref()
                .map(|control| control.get())
                .unwrap_or_default();
            log::info!(
                "stream: frame #{} {}x{} -> {}x{} edges, threshold {}",
                original.seq,
                original.width,
                original.height,
                processed.width,
                processed.height,
                threshold
            );
            self.last_status = Instant::now();
        }
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<PresenterEvent> {
        if !timeout.is_zero() {
            std::thread::sleep(timeout);
        }
        let quit = self
            .quit
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false);
        Ok(if quit {
            PresenterEvent::Quit
        } else {
            PresenterEvent::None
        })
    }

    fn close(&mut self) {
        log::info!(
            "HeadlessPresenter: closed after {} frames",
            self.frames_shown
        );
        self.quit = None;
        self.threshold = None;
    }
}

/// Process-wide interrupt flag. `ctrlc` allows a single handler per
/// process, so every presenter shares this one.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    static INTERRUPT: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    if let Some(flag) = INTERRUPT.get() {
        return Ok(flag.clone());
    }
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;
    Ok(INTERRUPT.get_or_init(|| flag).clone())
}
