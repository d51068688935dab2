//! Pixel buffers flowing through the pipeline.
//!
//! - `Frame`: one captured image, interleaved RGB24. Produced by a
//!   `FrameSource`, consumed by exactly one loop iteration, then dropped.
//! - `GrayFrame`: the single-channel processed buffer a transform produces.
//!
//! A `GrayFrame` is only valid as the output for a `Frame` of identical
//! spatial dimensions; the pipeline enforces that invariant after every
//! transform call.

use anyhow::{anyhow, Result};
use std::time::Instant;

/// Channels per pixel in a captured frame (interleaved RGB24).
pub const FRAME_CHANNELS: u32 = 3;

/// One captured image buffer.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of this frame in the source stream, starting at 1.
    pub seq: u64,
    /// Monotonic capture instant (latency bookkeeping, never exported).
    captured_at: Instant,
}

impl Frame {
    /// Create a frame. Called only by source implementations.
    ///
    /// The buffer length must be exactly `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be positive"));
        }
        let expected = (width as usize) * (height as usize) * FRAME_CHANNELS as usize;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            seq,
            captured_at: Instant::now(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel access for in-place annotation (fps stamp).
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Age of this frame since capture.
    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }
}

/// Single-channel processed buffer, produced fresh by a transform each
/// iteration.
pub struct GrayFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GrayFrame {
    /// The buffer length must be exactly `width * height`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("gray frame dimensions must be positive"));
        }
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(anyhow!(
                "gray frame buffer length mismatch: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Transform output must be the same size as its input frame.
    pub fn matches_dimensions(&self, source: &Frame) -> bool {
        self.width == source.width && self.height == source.height
    }
}
