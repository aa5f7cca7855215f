use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::format::VideoSubtype;

/// Default frame-rate tolerance for video negotiation, in frames per second.
pub const DEFAULT_FRAME_RATE_TOLERANCE: f64 = 0.1;

/// The exact video format a session asks the device for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoTarget {
    pub subtype: VideoSubtype,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Maximum accepted |reported fps - `fps`|.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_FRAME_RATE_TOLERANCE
}

impl Default for VideoTarget {
    fn default() -> Self {
        Self {
            subtype: VideoSubtype::Nv12,
            width: 1280,
            height: 720,
            fps: 30.0,
            tolerance: DEFAULT_FRAME_RATE_TOLERANCE,
        }
    }
}

impl VideoTarget {
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("invalid frame size: {}x{}", self.width, self.height));
        }
        if !(self.fps > 0.0) {
            return Err("frame rate must be positive".into());
        }
        if !(self.tolerance > 0.0) {
            return Err("frame-rate tolerance must be positive".into());
        }
        if self.subtype.is_compressed() {
            return Err(format!("compressed subtype not supported: {}", self.subtype));
        }
        Ok(())
    }
}

/// What the file sink keeps of the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRetention {
    /// Overwrite the file with every frame; the last frame survives.
    LatestOnly,
    /// Append every frame.
    Append,
}

/// Container for the captured audio bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioContainer {
    Raw,
    Wav,
}

/// Configuration for a capture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    pub video_target: VideoTarget,

    /// Only devices whose display name contains this string are captured.
    pub device_name_filter: Option<String>,

    pub enable_video_capture: bool,
    pub enable_audio_capture: bool,

    /// Directory where capture files are written.
    pub output_directory: PathBuf,
    pub video_file_name: String,
    pub audio_file_name: String,

    pub frame_retention: FrameRetention,
    pub audio_container: AudioContainer,

    /// Write a `.metadata.json` sidecar next to each capture file.
    pub write_metadata: bool,

    /// How long the harness keeps sessions delivering.
    pub capture_duration_secs: f64,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.enable_video_capture {
            self.video_target.validate()?;
        }
        if !self.enable_video_capture && !self.enable_audio_capture {
            return Err("nothing to capture: video and audio both disabled".into());
        }
        if self.video_file_name.is_empty() || self.audio_file_name.is_empty() {
            return Err("output file names must not be empty".into());
        }
        if !(self.capture_duration_secs > 0.0) {
            return Err("capture duration must be positive".into());
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid configuration: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn video_output_path(&self) -> PathBuf {
        self.output_directory.join(&self.video_file_name)
    }

    pub fn audio_output_path(&self) -> PathBuf {
        self.output_directory.join(&self.audio_file_name)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            video_target: VideoTarget::default(),
            device_name_filter: None,
            enable_video_capture: true,
            enable_audio_capture: true,
            output_directory: PathBuf::from("."),
            video_file_name: "input.nv12".into(),
            audio_file_name: "input.pcm".into(),
            frame_retention: FrameRetention::LatestOnly,
            audio_container: AudioContainer::Raw,
            write_metadata: true,
            capture_duration_secs: 10.0,
        }
    }
}
