//! FFmpeg-backed local file decoder.
//!
//! Frames are decoded in-memory and scaled to interleaved RGB24. End of the
//! container is surfaced as end-of-stream, not as an error.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use crate::config::CaptureSettings;
use crate::frame::Frame;

use super::{SourceInfo, FALLBACK_FPS};

pub(crate) struct FfmpegFileSource {
    path: String,
    capture: CaptureSettings,
    state: Option<OpenState>,
    eof_sent: bool,
    frame_count: u64,
}

struct OpenState {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: SourceInfo,
}

impl FfmpegFileSource {
    pub(crate) fn new(path: String, capture: CaptureSettings) -> Self {
        Self {
            path,
            capture,
            state: None,
            eof_sent: false,
            frame_count: 0,
        }
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&self.path)
            .with_context(|| format!("open video file '{}'", self.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("'{}' has no video track", self.path))?;
        let stream_index = input_stream.index();

        let nominal: f64 = input_stream.avg_frame_rate().into();
        let fps = if nominal.is_finite() && nominal >= 1.0 {
            nominal.round() as u32
        } else {
            FALLBACK_FPS
        };

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let info = SourceInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
        };
        log::info!(
            "FileSource: opened {} ({}x{} @ {} fps)",
            self.path,
            info.width,
            info.height,
            info.fps
        );

        self.state = Some(OpenState {
            input,
            stream_index,
            decoder,
            scaler,
            info,
        });
        self.eof_sent = false;
        Ok(())
    }

    pub(crate) fn info(&self) -> SourceInfo {
        match &self.state {
            Some(state) => state.info,
            None => SourceInfo {
                width: self.capture.width,
                height: self.capture.height,
                fps: FALLBACK_FPS,
            },
        }
    }

    pub(crate) fn read(&mut self) -> Result<Option<Frame>> {
        let state = self.state.as_mut().context("file source not opened")?;

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        loop {
            if state.decoder.receive_frame(&mut decoded).is_ok() {
                state
                    .scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Ok(Some(Frame::new(pixels, width, height, self.frame_count)?));
            }

            if self.eof_sent {
                return Ok(None);
            }

            // Feed the decoder the next packet of our stream, or flush it
            // once the container is exhausted.
            let mut fed = false;
            for (stream, packet) in state.input.packets() {
                if stream.index() != state.stream_index {
                    continue;
                }
                state
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                fed = true;
                break;
            }
            if !fed {
                let _ = state.decoder.send_eof();
                self.eof_sent = true;
            }
        }
    }

    pub(crate) fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!(
                "FileSource: closed {} after {} frames",
                self.path,
                self.frame_count
            );
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0) as usize;
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
