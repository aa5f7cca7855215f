use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::capture_metadata::{CaptureMetadata, CaptureResult};
use crate::models::config::{AudioContainer, CaptureConfiguration, FrameRetention};
use crate::models::device::{DeviceDescriptor, DeviceKind};
use crate::models::error::CaptureError;
use crate::models::format::NegotiatedFormat;
use crate::processing::wav_format::{self, WavFormatCode};
use crate::storage::metadata::write_metadata;
use crate::traits::frame_sink::{FrameSink, VideoFrame};

/// How a [`FileSink`] lays out what it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSinkOptions {
    pub frame_retention: FrameRetention,
    pub audio_container: AudioContainer,
    pub write_metadata: bool,
}

impl From<&CaptureConfiguration> for FileSinkOptions {
    fn from(config: &CaptureConfiguration) -> Self {
        Self {
            frame_retention: config.frame_retention,
            audio_container: config.audio_container,
            write_metadata: config.write_metadata,
        }
    }
}

struct SinkState {
    file: Option<File>,
    format: Option<NegotiatedFormat>,
    wav: Option<WavFormatCode>,
    frames_written: u64,
    /// Payload bytes currently in the file, header excluded.
    bytes_written: u64,
}

/// Writes raw captured bytes to one file.
///
/// ## File layout
///
/// **Video:** tightly packed frames in image order (top row first), all planes
/// included, row padding removed. With [`FrameRetention::LatestOnly`] the file holds only the most
/// recent frame.
///
/// **Audio, raw:** the device's interleaved samples as delivered.
///
/// **Audio, WAV:**
/// ```text
/// [44-byte WAV header, sizes patched on finish]
/// [interleaved PCM or float samples...]
/// ```
pub struct FileSink {
    kind: DeviceKind,
    device_name: String,
    device_identity: String,
    file_path: PathBuf,
    options: FileSinkOptions,
    state: Mutex<SinkState>,
}

impl FileSink {
    pub fn new(
        kind: DeviceKind,
        device_name: &str,
        device_identity: &str,
        file_path: PathBuf,
        options: FileSinkOptions,
    ) -> Self {
        Self {
            kind,
            device_name: device_name.to_string(),
            device_identity: device_identity.to_string(),
            file_path,
            options,
            state: Mutex::new(SinkState {
                file: None,
                format: None,
                wav: None,
                frames_written: 0,
                bytes_written: 0,
            }),
        }
    }

    /// Sink for `device` at the configured output path of its kind.
    pub fn for_device(config: &CaptureConfiguration, device: &DeviceDescriptor) -> Self {
        let path = match device.kind {
            DeviceKind::Video => config.video_output_path(),
            DeviceKind::Audio => config.audio_output_path(),
        };
        Self::new(device.kind, &device.name, &device.identity, path, config.into())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn frames_written(&self) -> u64 {
        self.state.lock().frames_written
    }

    /// Close the file, patch the WAV header if any, checksum the result and
    /// optionally write the metadata sidecar.
    pub fn finish(&self) -> Result<CaptureResult, CaptureError> {
        let mut state = self.state.lock();

        if let Some(mut file) = state.file.take() {
            if state.wav.is_some() {
                for (offset, bytes) in wav_format::size_patches(state.bytes_written) {
                    file.seek(SeekFrom::Start(offset))
                        .map_err(|e| CaptureError::StorageError(e.to_string()))?;
                    file.write_all(&bytes)
                        .map_err(|e| CaptureError::StorageError(e.to_string()))?;
                }
            }
            file.flush()
                .map_err(|e| CaptureError::StorageError(e.to_string()))?;
        }

        let checksum = if self.file_path.exists() {
            sha256_file(&self.file_path)?
        } else {
            String::new()
        };

        let mut metadata = CaptureMetadata::new(
            self.kind,
            &self.device_name,
            &self.device_identity,
            state.format,
            &self.file_path.to_string_lossy(),
        );
        metadata.frames_written = state.frames_written;
        metadata.bytes_written = state.bytes_written;
        metadata.checksum = checksum;

        if self.options.write_metadata {
            write_metadata(&metadata, &self.file_path)?;
        }

        log::info!(
            "{}: {} frame(s), {} byte(s), sha256 {}",
            self.file_path.display(),
            metadata.frames_written,
            metadata.bytes_written,
            metadata.checksum
        );

        Ok(CaptureResult {
            file_path: self.file_path.clone(),
            metadata,
        })
    }

    fn create_file(&self) -> Result<File, CaptureError> {
        if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
        }
        File::create(&self.file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))
    }
}

impl FrameSink for FileSink {
    fn on_format_negotiated(&self, format: &NegotiatedFormat) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        state.format = Some(*format);
        state.frames_written = 0;
        state.bytes_written = 0;
        state.wav = None;
        state.file = None;

        match format {
            NegotiatedFormat::Video { .. } => {
                if self.options.frame_retention == FrameRetention::Append {
                    state.file = Some(self.create_file()?);
                }
            }
            NegotiatedFormat::Audio { format } => {
                let mut file = self.create_file()?;
                if self.options.audio_container == AudioContainer::Wav {
                    let code = WavFormatCode::for_subtype(format.subtype).ok_or_else(|| {
                        CaptureError::StorageError(format!("{} cannot be stored as WAV", format.subtype))
                    })?;
                    file.write_all(&wav_format::generate_wav_header(format, code, 0))
                        .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
                    state.wav = Some(code);
                }
                state.file = Some(file);
            }
        }
        Ok(())
    }

    fn on_video_frame(&self, frame: &VideoFrame<'_>) -> Result<(), CaptureError> {
        let image = frame.image_bytes().ok_or_else(|| {
            CaptureError::StorageError(format!(
                "{}x{} {} frame does not fit its {}-byte buffer",
                frame.width,
                frame.height,
                frame.subtype,
                frame.data.len()
            ))
        })?;

        let mut state = self.state.lock();
        match self.options.frame_retention {
            FrameRetention::LatestOnly => {
                let mut file = self.create_file()?;
                file.write_all(&image)
                    .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
                state.bytes_written = image.len() as u64;
            }
            FrameRetention::Append => {
                let file = state
                    .file
                    .as_mut()
                    .ok_or_else(|| CaptureError::StorageError("file is not open for writing".into()))?;
                file.write_all(&image)
                    .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
                state.bytes_written += image.len() as u64;
            }
        }
        state.frames_written += 1;
        Ok(())
    }

    fn on_audio_frame(&self, data: &[u8]) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open for writing".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        state.bytes_written += data.len() as u64;
        state.frames_written += 1;
        Ok(())
    }
}

/// SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data =
        fs::read(path).map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&Sha256::digest(&data)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
