//! # mf-capture-core
//!
//! Platform-agnostic capture negotiation and sample-delivery engine.
//!
//! Lists capture devices with their native formats, picks the first native
//! format matching a target, and drives an asynchronous one-request-per-sample
//! delivery loop that hands locked buffers to a [`FrameSink`]. The host media
//! platform is reached only through the traits in [`traits::platform`];
//! `mf-capture-windows` implements them on Media Foundation.
//!
//! ## Architecture
//!
//! ```text
//! mf-capture-core (this crate)
//! ├── traits/       ← platform seams, FrameSink, CaptureDelegate
//! ├── models/       ← CaptureError, SessionState, formats, devices, configuration
//! ├── directory/    ← DeviceDirectory (enumeration, resolve by identity)
//! ├── negotiation/  ← FormatNegotiator (first-match scan, stride derivation)
//! ├── processing/   ← RAII buffer locks, WAV header generation
//! ├── session/      ← CaptureSession (start / callback / stop), CaptureHandle
//! └── storage/      ← FileSink, metadata sidecar
//! ```

pub mod directory;
pub mod models;
pub mod negotiation;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use directory::device_directory::DeviceDirectory;
pub use models::capture_metadata::{CaptureMetadata, CaptureResult, SessionDiagnostics};
pub use models::config::{AudioContainer, CaptureConfiguration, FrameRetention, VideoTarget};
pub use models::device::{DeviceDescriptor, DeviceKind, MajorType, StreamSelector};
pub use models::error::{CaptureError, StatusCode};
pub use models::format::{
    AudioFormat, AudioSubtype, FormatDescriptor, FrameRate, FrameRateRange, NegotiatedFormat,
    PlaneLayout, VideoFormat, VideoSubtype,
};
pub use models::state::SessionState;
pub use negotiation::negotiator::FormatNegotiator;
pub use session::capture::{CaptureHandle, CaptureSession};
pub use storage::file_sink::{FileSink, FileSinkOptions};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::frame_sink::{FrameSink, VideoFrame};
