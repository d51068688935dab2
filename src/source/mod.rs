//! Frame acquisition sources.
//!
//! This module provides the sources a pipeline can acquire frames from:
//! - V4L2 camera devices (feature: capture-v4l2)
//! - Local video files (feature: decode-ffmpeg)
//! - Synthetic source (`stub://` locators, always available)
//!
//! All sources produce `Frame` instances on demand and signal end-of-stream
//! by returning `Ok(None)`. A source is opened once, read sequentially by a
//! single owner, and closed during pipeline drain.

use anyhow::{anyhow, Result};

use crate::config::CaptureSettings;
use crate::frame::Frame;

#[cfg(feature = "decode-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod file;
pub mod synthetic;
#[cfg(feature = "capture-v4l2")]
pub mod v4l2;

pub use file::FileSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "capture-v4l2")]
pub use v4l2::V4l2Source;

/// Nominal frame rate assumed when a source does not report one.
pub const FALLBACK_FPS: u32 = 30;

/// Stream properties, valid after `open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frames per second; never 0 (see `FALLBACK_FPS`).
    pub fps: u32,
}

/// A source of frames.
///
/// `read` suspends until a frame is available or the stream ends; `Ok(None)`
/// is the end-of-stream signal, not an error.
pub trait FrameSource {
    /// Open the underlying device/file. Must be called before `read`.
    fn open(&mut self) -> Result<()>;

    /// Stream properties. Only meaningful after a successful `open`.
    fn info(&self) -> SourceInfo;

    /// Acquire the next frame, or `None` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Dropping the source also releases it;
    /// the explicit call makes the drain transition observable.
    fn close(&mut self) {}
}

/// What to capture from, parsed from the startup selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Local camera by index (`cam:0` is the default when no selector is
    /// given).
    Camera(u32),
    /// File path or stream locator; `stub://` selects the synthetic source.
    Locator(String),
}

impl Selector {
    pub fn parse(arg: Option<&str>) -> Result<Self> {
        let Some(raw) = arg else {
            return Ok(Selector::Camera(0));
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(anyhow!("source selector must not be empty"));
        }
        if let Some(index) = raw.strip_prefix("cam:") {
            let index: u32 = index
                .parse()
                .map_err(|_| anyhow!("camera selector must be cam:<index>, got '{raw}'"))?;
            return Ok(Selector::Camera(index));
        }
        Ok(Selector::Locator(raw.to_string()))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Camera(index) => write!(f, "cam:{index}"),
            Selector::Locator(locator) => f.write_str(locator),
        }
    }
}

/// Construct the source a selector names. The source is returned unopened;
/// the pipeline opens it during INIT.
pub fn create_source(selector: &Selector, capture: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
    match selector {
        Selector::Camera(index) => {
            #[cfg(feature = "capture-v4l2")]
            {
                Ok(Box::new(V4l2Source::for_index(*index, capture.clone())))
            }
            #[cfg(not(feature = "capture-v4l2"))]
            {
                Err(anyhow!(
                    "camera capture (cam:{index}) requires the capture-v4l2 feature"
                ))
            }
        }
        Selector::Locator(locator) if locator.starts_with("stub://") => Ok(Box::new(
            SyntheticSource::new(locator.clone(), capture.clone()),
        )),
        Selector::Locator(locator) => {
            if locator.contains("://") {
                return Err(anyhow!(
                    "unsupported stream locator '{locator}' (only local files and stub:// are supported)"
                ));
            }
            FileSource::create(locator.clone(), capture.clone())
        }
    }
}
