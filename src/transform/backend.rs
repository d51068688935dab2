use anyhow::Result;

use crate::frame::{Frame, GrayFrame};

/// Edge-detection transform contract.
///
/// One call per acquired frame: a frame plus the current threshold in, a
/// processed buffer of identical dimensions out. The pipeline treats the
/// call as synchronous and blocking; implementations may parallelize
/// internally but must not return partial results.
///
/// A returned error means the transform cannot execute (device unavailable,
/// kernel launch failure). The pipeline treats that as fatal and drains —
/// there is no retry path.
pub trait Transform {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Produce the thresholded edge map for one frame.
    ///
    /// The output must have the same width and height as `frame`; the
    /// pipeline verifies this after every call.
    fn apply(&mut self, frame: &Frame, threshold: u8) -> Result<GrayFrame>;

    /// Optional warm-up hook (kernel compilation, scratch allocation).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
