//! Local video file source.
//!
//! Decoding is delegated to FFmpeg behind the `decode-ffmpeg` feature; the
//! default build refuses file locators with a clear error instead of
//! shipping a decoder it cannot exercise.

use anyhow::Result;
#[cfg(not(feature = "decode-ffmpeg"))]
use anyhow::anyhow;

use crate::config::CaptureSettings;
#[cfg(feature = "decode-ffmpeg")]
use crate::frame::Frame;

#[cfg(feature = "decode-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
#[cfg(feature = "decode-ffmpeg")]
use super::SourceInfo;

/// File-backed frame source (FFmpeg decode).
#[cfg(feature = "decode-ffmpeg")]
pub struct FileSource {
    inner: FfmpegFileSource,
}

#[cfg(feature = "decode-ffmpeg")]
impl FileSource {
    pub fn create(path: String, capture: CaptureSettings) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(Self {
            inner: FfmpegFileSource::new(path, capture),
        }))
    }
}

#[cfg(feature = "decode-ffmpeg")]
impl FrameSource for FileSource {
    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn info(&self) -> SourceInfo {
        self.inner.info()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        self.inner.read()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(not(feature = "decode-ffmpeg"))]
pub struct FileSource;

#[cfg(not(feature = "decode-ffmpeg"))]
impl FileSource {
    pub fn create(path: String, _capture: CaptureSettings) -> Result<Box<dyn FrameSource>> {
        Err(anyhow!(
            "file playback ('{path}') requires the decode-ffmpeg feature"
        ))
    }
}
