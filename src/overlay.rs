//! In-place frame annotation.
//!
//! Stamps the smoothed frame rate onto the original stream as "FPS: N",
//! top-left, green. The glyph set is a fixed 5x7 bitmap table covering
//! exactly the characters the stamp can contain, so no font asset ships
//! with the binary.

use crate::frame::{Frame, FRAME_CHANNELS};

const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;
/// Pixels per glyph cell edge.
const SCALE: usize = 2;
/// Top-left corner of the stamp.
const ORIGIN_X: usize = 10;
const ORIGIN_Y: usize = 10;
/// Stamp color (RGB).
const COLOR: [u8; 3] = [0, 255, 0];

/// Stamp "FPS: N" onto the frame, rounding half-up like a human-facing
/// counter. A zero rate renders as "FPS: 0".
pub fn stamp_rate(frame: &mut Frame, rate: f32) {
    let label = format!("FPS: {}", (rate + 0.5) as u32);
    draw_label(frame, &label);
}

fn draw_label(frame: &mut Frame, label: &str) {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let pixels = frame.pixels_mut();

    let mut pen_x = ORIGIN_X;
    for ch in label.chars() {
        let Some(rows) = glyph(ch) else {
            pen_x += (GLYPH_WIDTH + 1) * SCALE;
            continue;
        };
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        let x = pen_x + col * SCALE + dx;
                        let y = ORIGIN_Y + row * SCALE + dy;
                        if x >= width || y >= height {
                            continue;
                        }
                        let offset = (y * width + x) * FRAME_CHANNELS as usize;
                        pixels[offset..offset + 3].copy_from_slice(&COLOR);
                    }
                }
            }
        }
        pen_x += (GLYPH_WIDTH + 1) * SCALE;
    }
}

/// 5x7 glyphs, one bit per pixel, most significant bit left.
fn glyph(ch: char) -> Option<&'static [u8; GLYPH_HEIGHT]> {
    let rows: &[u8; GLYPH_HEIGHT] = match ch {
        '0' => &[0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => &[0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => &[0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => &[0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => &[0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => &[0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => &[0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => &[0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => &[0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => &[0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'F' => &[0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'P' => &[0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'S' => &[0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        ':' => &[0b00000, 0b00100, 0b00000, 0b00000, 0b00100, 0b00000, 0b00000],
        _ => return None,
    };
    Some(rows)
}
