use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::device::DeviceKind;
use super::format::NegotiatedFormat;

/// Counters for debugging a capture session's delivery loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub callbacks: u64,
    pub samples_delivered: u64,
    /// Successful callbacks that carried no sample.
    pub empty_callbacks: u64,
    pub stream_ticks: u64,
    pub bytes_delivered: u64,
    pub sink_failures: u64,
    pub lock_failures: u64,
    /// Samples with more than one buffer; only the first reaches the sink.
    pub multi_buffer_samples: u64,
    /// Timestamp of the most recent sample, in 100 ns units.
    pub last_timestamp: Option<i64>,
}

/// Result returned when a file sink is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub file_path: PathBuf,
    pub metadata: CaptureMetadata,
}

/// Describes a raw capture file, which carries no header of its own.
///
/// Serialized as a JSON sidecar next to the capture file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub id: String,
    pub kind: DeviceKind,
    pub device_name: String,
    pub device_identity: String,
    pub format: Option<NegotiatedFormat>,
    pub file_path: String,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub checksum: String,
    pub created_at: String,
}

impl CaptureMetadata {
    pub fn new(
        kind: DeviceKind,
        device_name: &str,
        device_identity: &str,
        format: Option<NegotiatedFormat>,
        file_path: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            device_name: device_name.to_string(),
            device_identity: device_identity.to_string(),
            format,
            file_path: file_path.to_string(),
            frames_written: 0,
            bytes_written: 0,
            checksum: String::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
