use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::capture_metadata::CaptureMetadata;
use crate::models::error::CaptureError;

/// `{capture_path}.metadata.json`, kept next to the capture file.
///
/// The full file name is kept so `input.nv12` and `input.pcm` in one
/// directory get distinct sidecars.
pub fn sidecar_path(capture_path: &Path) -> PathBuf {
    let mut name = OsString::from(capture_path.as_os_str());
    name.push(".metadata.json");
    PathBuf::from(name)
}

/// Write capture metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &CaptureMetadata, capture_path: &Path) -> Result<PathBuf, CaptureError> {
    let metadata_path = sidecar_path(capture_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&metadata_path, json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(metadata_path)
}

/// Read capture metadata from the sidecar of `capture_path`.
pub fn read_metadata(capture_path: &Path) -> Result<CaptureMetadata, CaptureError> {
    let json = fs::read_to_string(sidecar_path(capture_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))
}
