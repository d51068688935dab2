use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::record::DEFAULT_OUTPUT_PATH;

const DEFAULT_CAPTURE_WIDTH: u32 = 640;
const DEFAULT_CAPTURE_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_FPS: u32 = 30;
const DEFAULT_POLL_MS: u64 = 1;

#[derive(Debug, Deserialize, Default)]
struct EdgecamConfigFile {
    capture: Option<CaptureConfigFile>,
    record: Option<RecordConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    stub_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordConfigFile {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    poll_ms: Option<u64>,
}

/// Capture preferences handed to whichever source the selector names.
///
/// Real devices treat width/height/fps as a request and report what they
/// actually deliver; the synthetic source follows them exactly, ending the
/// stream after `stub_frames` frames when set.
#[derive(Clone, Debug)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub stub_frames: Option<u64>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            target_fps: DEFAULT_CAPTURE_FPS,
            stub_frames: None,
        }
    }
}

/// Runtime configuration: defaults, then the optional `EDGECAM_CONFIG` JSON
/// file, then `EDGECAM_*` environment overrides.
#[derive(Clone, Debug)]
pub struct EdgecamConfig {
    pub capture: CaptureSettings,
    pub record_path: String,
    pub poll_timeout: Duration,
}

impl EdgecamConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("EDGECAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EdgecamConfigFile) -> Self {
        let capture = CaptureSettings {
            width: file
                .capture
                .as_ref()
                .and_then(|capture| capture.width)
                .unwrap_or(DEFAULT_CAPTURE_WIDTH),
            height: file
                .capture
                .as_ref()
                .and_then(|capture| capture.height)
                .unwrap_or(DEFAULT_CAPTURE_HEIGHT),
            target_fps: file
                .capture
                .as_ref()
                .and_then(|capture| capture.target_fps)
                .unwrap_or(DEFAULT_CAPTURE_FPS),
            stub_frames: file.capture.and_then(|capture| capture.stub_frames),
        };
        let record_path = file
            .record
            .and_then(|record| record.path)
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string());
        let poll_ms = file
            .display
            .and_then(|display| display.poll_ms)
            .unwrap_or(DEFAULT_POLL_MS);
        Self {
            capture,
            record_path,
            poll_timeout: Duration::from_millis(poll_ms),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("EDGECAM_RECORD_PATH") {
            if !path.trim().is_empty() {
                self.record_path = path;
            }
        }
        if let Ok(poll_ms) = std::env::var("EDGECAM_POLL_MS") {
            let poll_ms: u64 = poll_ms
                .parse()
                .map_err(|_| anyhow!("EDGECAM_POLL_MS must be an integer number of ms"))?;
            self.poll_timeout = Duration::from_millis(poll_ms);
        }
        if let Ok(frames) = std::env::var("EDGECAM_STUB_FRAMES") {
            let frames: u64 = frames
                .parse()
                .map_err(|_| anyhow!("EDGECAM_STUB_FRAMES must be an integer frame count"))?;
            self.capture.stub_frames = Some(frames);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture size must be positive"));
        }
        if self.poll_timeout.is_zero() {
            return Err(anyhow!("display poll_ms must be at least 1"));
        }
        if self.record_path.trim().is_empty() {
            return Err(anyhow!("record path must not be empty"));
        }
        Ok(())
    }
}

impl Default for EdgecamConfig {
    fn default() -> Self {
        Self::from_file(EdgecamConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<EdgecamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
