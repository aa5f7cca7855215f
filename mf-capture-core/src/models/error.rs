use std::fmt;

use thiserror::Error;

/// A platform status code as delivered by the capture pipeline (an HRESULT on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);

    /// `MF_E_VIDEO_RECORDING_DEVICE_INVALIDATED`: the device was unplugged or taken away.
    pub const DEVICE_LOST: StatusCode = StatusCode(0xC00D_3EA2_u32 as i32);

    /// `E_FAIL`, used when a wrapper has no more specific code to report.
    pub const FAIL: StatusCode = StatusCode(0x8000_4005_u32 as i32);

    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    pub fn is_device_lost(self) -> bool {
        self == Self::DEVICE_LOST
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

/// Errors that can occur while enumerating, negotiating or capturing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Programmer error: the call is not valid in the current state.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// No native format satisfied the requested target.
    #[error("format negotiation failed: {0}")]
    NegotiationFailure(String),

    /// The platform could not create or configure a pipeline object.
    #[error("resource acquisition failed: {context} ({status})")]
    ResourceAcquisition { context: String, status: StatusCode },

    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("delivery failed: {0}")]
    Delivery(StatusCode),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    pub fn resource(context: impl Into<String>, status: StatusCode) -> Self {
        Self::ResourceAcquisition {
            context: context.into(),
            status,
        }
    }

    /// The platform status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ResourceAcquisition { status, .. } | Self::Delivery(status) => Some(*status),
            _ => None,
        }
    }
}
