//! Synthetic frame source for tests, demos, and hardware-free builds.

use anyhow::Result;

use crate::config::CaptureSettings;
use crate::frame::{Frame, FRAME_CHANNELS};

use super::{FrameSource, SourceInfo, FALLBACK_FPS};

/// Generates a drifting gradient pattern at the configured size and rate.
///
/// Selected by `stub://` locators. When `stub_frames` is set in the capture
/// settings the source signals end-of-stream after that many frames, which
/// gives demos and tests a finite stream.
pub struct SyntheticSource {
    locator: String,
    capture: CaptureSettings,
    opened: bool,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(locator: String, capture: CaptureSettings) -> Self {
        Self {
            locator,
            capture,
            opened: false,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count =
            (self.capture.width * self.capture.height * FRAME_CHANNELS) as usize;
        // Drifting pattern: position mixed with frame count so consecutive
        // frames differ and edges exist for the transform to find.
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 / 16 + self.frame_count * 3) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        log::info!("SyntheticSource: opened {} (synthetic)", self.locator);
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.capture.width,
            height: self.capture.height,
            fps: if self.capture.target_fps == 0 {
                FALLBACK_FPS
            } else {
                self.capture.target_fps
            },
        }
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        debug_assert!(self.opened, "read before open");
        if let Some(limit) = self.capture.stub_frames {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        let frame = Frame::new(
            pixels,
            self.capture.width,
            self.capture.height,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.opened = false;
        log::debug!(
            "SyntheticSource: closed {} after {} frames",
            self.locator,
            self.frame_count
        );
    }
}
