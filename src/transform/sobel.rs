use anyhow::Result;

use crate::frame::{Frame, GrayFrame};

use super::Transform;

/// CPU Sobel backend.
///
/// Luma conversion, 3x3 Sobel gradients, magnitude thresholded to a binary
/// edge map. Border pixels stay 0 (the kernel window does not fit there).
pub struct SobelCpu {
    /// Scratch luma plane, reused across frames.
    luma: Vec<u8>,
}

impl SobelCpu {
    pub fn new() -> Self {
        Self { luma: Vec::new() }
    }

    fn fill_luma(&mut self, frame: &Frame) {
        self.luma.clear();
        self.luma.reserve(frame.width as usize * frame.height as usize);
        for px in frame.pixels().chunks_exact(3) {
            // Integer BT.601 luma: (77 R + 150 G + 29 B) / 256.
            let y = (77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8;
            self.luma.push(y as u8);
        }
    }
}

impl Default for SobelCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for SobelCpu {
    fn name(&self) -> &'static str {
        "sobel-cpu"
    }

    fn apply(&mut self, frame: &Frame, threshold: u8) -> Result<GrayFrame> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        self.fill_luma(frame);

        let luma = &self.luma;
        let mut out = vec![0u8; width * height];
        let cutoff = threshold as f32;

        for y in 1..height.saturating_sub(1) {
            for x in 1..width.saturating_sub(1) {
                let at = |dx: isize, dy: isize| -> i32 {
                    let row = (y as isize + dy) as usize;
                    let col = (x as isize + dx) as usize;
                    luma[row * width + col] as i32
                };

                let gx = -at(-1, -1) + at(1, -1) - 2 * at(-1, 0) + 2 * at(1, 0) - at(-1, 1)
                    + at(1, 1);
                let gy = -at(-1, -1) - 2 * at(0, -1) - at(1, -1)
                    + at(-1, 1)
                    + 2 * at(0, 1)
                    + at(1, 1);

                let magnitude = ((gx * gx + gy * gy) as f32).sqrt().min(255.0);
                out[y * width + x] = if magnitude > cutoff { 255 } else { 0 };
            }
        }

        GrayFrame::new(out, frame.width, frame.height)
    }
}
