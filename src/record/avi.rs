//! Minimal RIFF/AVI muxer for a single Motion-JPEG video stream.
//!
//! Layout: RIFF('AVI ' LIST('hdrl' avih LIST('strl' strh strf)) LIST('movi'
//! 00dc...) idx1). Header fields that depend on the final frame count are
//! written as placeholders and patched in `finalize`.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::frame::GrayFrame;
use crate::source::SourceInfo;

use super::{Recorder, CODEC_TAG};

const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

// Fixed header geometry (bytes from the start of the file).
const OFFSET_RIFF_SIZE: u64 = 4;
const OFFSET_TOTAL_FRAMES: u64 = 48;
const OFFSET_SUGGESTED_BUFFER: u64 = 60;
const OFFSET_STREAM_LENGTH: u64 = 140;
const OFFSET_STREAM_BUFFER: u64 = 144;
const OFFSET_MOVI_SIZE: u64 = 216;
const MOVI_LIST_START: u64 = 220;

const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Motion-JPEG AVI recorder.
pub struct AviRecorder {
    path: PathBuf,
    quality: u8,
    state: Option<OpenState>,
}

struct OpenState {
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    /// (offset relative to the 'movi' fourcc, chunk payload size).
    index: Vec<(u32, u32)>,
    max_chunk: u32,
    finalized: bool,
}

impl AviRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quality: DEFAULT_JPEG_QUALITY,
            state: None,
        }
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.state
            .as_ref()
            .map(|state| state.index.len() as u64)
            .unwrap_or(0)
    }
}

impl Recorder for AviRecorder {
    fn open(&mut self, info: &SourceInfo) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("create recorder output {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        write_headers(&mut writer, info)?;

        self.state = Some(OpenState {
            writer,
            width: info.width,
            height: info.height,
            index: Vec::new(),
            max_chunk: 0,
            finalized: false,
        });
        log::info!(
            "AviRecorder: recording {}x{} @ {} fps to {}",
            info.width,
            info.height,
            info.fps,
            self.path.display()
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &GrayFrame) -> Result<()> {
        let state = self.state.as_mut().context("recorder not opened")?;
        if frame.width != state.width || frame.height != state.height {
            return Err(anyhow!(
                "recorder frame size changed: opened {}x{}, got {}x{}",
                state.width,
                state.height,
                frame.width,
                frame.height
            ));
        }

        let mut jpeg = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, self.quality);
        encoder
            .encode(
                frame.pixels(),
                frame.width,
                frame.height,
                image::ExtendedColorType::L8,
            )
            .context("encode frame as JPEG")?;

        let chunk_size = jpeg.len() as u32;
        let offset = (state.writer.stream_position()? - MOVI_LIST_START) as u32;

        state.writer.write_all(b"00dc")?;
        state.writer.write_all(&chunk_size.to_le_bytes())?;
        state.writer.write_all(&jpeg)?;
        if chunk_size % 2 == 1 {
            state.writer.write_all(&[0])?;
        }

        state.index.push((offset, chunk_size));
        state.max_chunk = state.max_chunk.max(chunk_size);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        if state.finalized {
            return Ok(());
        }

        let movi_end = state.writer.stream_position()?;

        // idx1: one entry per chunk, offsets relative to the 'movi' fourcc.
        state.writer.write_all(b"idx1")?;
        state
            .writer
            .write_all(&((state.index.len() * 16) as u32).to_le_bytes())?;
        for &(offset, size) in &state.index {
            state.writer.write_all(b"00dc")?;
            state.writer.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            state.writer.write_all(&offset.to_le_bytes())?;
            state.writer.write_all(&size.to_le_bytes())?;
        }
        let file_end = state.writer.stream_position()?;

        let total_frames = state.index.len() as u32;
        let patches: [(u64, u32); 6] = [
            (OFFSET_RIFF_SIZE, (file_end - 8) as u32),
            (OFFSET_TOTAL_FRAMES, total_frames),
            (OFFSET_SUGGESTED_BUFFER, state.max_chunk),
            (OFFSET_STREAM_LENGTH, total_frames),
            (OFFSET_STREAM_BUFFER, state.max_chunk),
            (OFFSET_MOVI_SIZE, (movi_end - MOVI_LIST_START) as u32),
        ];
        for (offset, value) in patches {
            state.writer.seek(SeekFrom::Start(offset))?;
            state.writer.write_all(&value.to_le_bytes())?;
        }

        state.writer.flush().context("flush recorder output")?;
        state.finalized = true;
        log::info!(
            "AviRecorder: finalized {} ({} frames)",
            self.path.display(),
            total_frames
        );
        Ok(())
    }
}

fn write_headers(writer: &mut BufWriter<File>, info: &SourceInfo) -> Result<()> {
    let fps = info.fps.max(1);
    let frame_bytes = info.width * info.height * 3;

    writer.write_all(b"RIFF")?;
    writer.write_all(&0u32.to_le_bytes())?; // riff size, patched
    writer.write_all(b"AVI ")?;

    // LIST hdrl: 'hdrl' + avih(8+56) + LIST strl(8+116).
    writer.write_all(b"LIST")?;
    writer.write_all(&192u32.to_le_bytes())?;
    writer.write_all(b"hdrl")?;

    writer.write_all(b"avih")?;
    writer.write_all(&56u32.to_le_bytes())?;
    writer.write_all(&(1_000_000 / fps).to_le_bytes())?; // us per frame
    writer.write_all(&(frame_bytes * fps).to_le_bytes())?; // max bytes/sec
    writer.write_all(&0u32.to_le_bytes())?; // padding granularity
    writer.write_all(&AVIF_HASINDEX.to_le_bytes())?;
    writer.write_all(&0u32.to_le_bytes())?; // total frames, patched
    writer.write_all(&0u32.to_le_bytes())?; // initial frames
    writer.write_all(&1u32.to_le_bytes())?; // streams
    writer.write_all(&0u32.to_le_bytes())?; // suggested buffer, patched
    writer.write_all(&info.width.to_le_bytes())?;
    writer.write_all(&info.height.to_le_bytes())?;
    writer.write_all(&[0u8; 16])?; // reserved

    // LIST strl: 'strl' + strh(8+56) + strf(8+40).
    writer.write_all(b"LIST")?;
    writer.write_all(&116u32.to_le_bytes())?;
    writer.write_all(b"strl")?;

    writer.write_all(b"strh")?;
    writer.write_all(&56u32.to_le_bytes())?;
    writer.write_all(b"vids")?;
    writer.write_all(&CODEC_TAG)?;
    writer.write_all(&0u32.to_le_bytes())?; // flags
    writer.write_all(&0u16.to_le_bytes())?; // priority
    writer.write_all(&0u16.to_le_bytes())?; // language
    writer.write_all(&0u32.to_le_bytes())?; // initial frames
    writer.write_all(&1u32.to_le_bytes())?; // scale
    writer.write_all(&fps.to_le_bytes())?; // rate: fps = rate / scale
    writer.write_all(&0u32.to_le_bytes())?; // start
    writer.write_all(&0u32.to_le_bytes())?; // length, patched
    writer.write_all(&0u32.to_le_bytes())?; // suggested buffer, patched
    writer.write_all(&u32::MAX.to_le_bytes())?; // quality: default
    writer.write_all(&0u32.to_le_bytes())?; // sample size
    writer.write_all(&0u16.to_le_bytes())?; // rcFrame.left
    writer.write_all(&0u16.to_le_bytes())?; // rcFrame.top
    writer.write_all(&(info.width as u16).to_le_bytes())?;
    writer.write_all(&(info.height as u16).to_le_bytes())?;

    // strf: BITMAPINFOHEADER. The payload is grayscale Motion-JPEG; MJPEG
    // containers still declare 24-bit RGB as the decoded format.
    writer.write_all(b"strf")?;
    writer.write_all(&40u32.to_le_bytes())?;
    writer.write_all(&40u32.to_le_bytes())?; // biSize
    writer.write_all(&info.width.to_le_bytes())?;
    writer.write_all(&info.height.to_le_bytes())?;
    writer.write_all(&1u16.to_le_bytes())?; // planes
    writer.write_all(&24u16.to_le_bytes())?; // bit count
    writer.write_all(&CODEC_TAG)?; // compression
    writer.write_all(&frame_bytes.to_le_bytes())?; // size image
    writer.write_all(&[0u8; 16])?; // ppm/clr fields

    // LIST movi, size patched once the stream length is known.
    writer.write_all(b"LIST")?;
    writer.write_all(&0u32.to_le_bytes())?;
    debug_assert_eq!(writer.stream_position()?, MOVI_LIST_START);
    writer.write_all(b"movi")?;

    Ok(())
}
