//! Persistence of the processed stream.
//!
//! The recorder appends processed frames to a Motion-JPEG AVI file. The
//! output path and codec tag are fixed by convention; frame rate and size
//! come from the source properties captured at open time.

mod avi;

pub use avi::AviRecorder;

use anyhow::Result;

use crate::frame::GrayFrame;
use crate::source::SourceInfo;

/// Conventional output filename for the processed stream.
pub const DEFAULT_OUTPUT_PATH: &str = "edgecam_output.avi";

/// Four-character codec tag of the persisted stream.
pub const CODEC_TAG: [u8; 4] = *b"MJPG";

/// Sink for processed frames.
///
/// `open` runs during pipeline INIT and its failure is fatal; `write_frame`
/// appends one frame per iteration; `finalize` runs during drain and makes
/// the container playable.
pub trait Recorder {
    fn open(&mut self, info: &SourceInfo) -> Result<()>;

    fn write_frame(&mut self, frame: &GrayFrame) -> Result<()>;

    fn finalize(&mut self) -> Result<()>;
}
