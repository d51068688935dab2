//! V4L2 camera source.
//!
//! Captures RGB24 frames from a local device node via libv4l. The mmap
//! stream borrows from the device handle, hence the self-referencing state.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use crate::config::CaptureSettings;
use crate::frame::Frame;

use super::{FrameSource, SourceInfo, FALLBACK_FPS};

/// Camera frame source backed by V4L2.
pub struct V4l2Source {
    device_path: String,
    capture: CaptureSettings,
    state: Option<V4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    /// Source for camera index N (`/dev/videoN`).
    pub fn for_index(index: u32, capture: CaptureSettings) -> Self {
        Self::with_path(format!("/dev/video{index}"), capture)
    }

    pub fn with_path(device_path: String, capture: CaptureSettings) -> Self {
        Self {
            active_width: capture.width,
            active_height: capture.height,
            device_path,
            capture,
            state: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for V4l2Source {
    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.device_path)
            .with_context(|| format!("open v4l2 device {}", self.device_path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.capture.width;
        format.height = self.capture.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.device_path,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.capture.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.capture.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.device_path,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: opened {} ({}x{})",
            self.device_path,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.active_width,
            height: self.active_height,
            fps: if self.capture.target_fps == 0 {
                FALLBACK_FPS
            } else {
                self.capture.target_fps
            },
        }
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not opened")?;
        let (buf, _meta) = state
            .with_stream_mut(|stream| stream.next())
            .context("capture v4l2 frame")?;

        self.frame_count += 1;
        let frame = Frame::new(
            buf.to_vec(),
            self.active_width,
            self.active_height,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!(
                "V4l2Source: closed {} after {} frames",
                self.device_path,
                self.frame_count
            );
        }
    }
}
