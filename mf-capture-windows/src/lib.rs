//! # mf-capture-windows
//!
//! Windows Media Foundation backend for mf-capture.
//!
//! Provides:
//! - `MediaFoundationRuntime`: COM + Media Foundation startup guard
//! - `MfDeviceBackend`: device enumeration via `MFEnumDeviceSources` and
//!   reopening by symbolic link via `MFCreateDeviceSource`
//! - `WinMediaSource` / `WinSourceReader`: asynchronous source reader with a
//!   COM callback adapter forwarding into the core session
//! - `WinSample` / `WinMediaBuffer`: sample buffers with 2-D lock support
//!
//! ## Platform Requirements
//! - Windows 8+ (`IMF2DBuffer2::Lock2DSize`)
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use mf_capture_core::{CaptureHandle, CaptureSession, DeviceDirectory, DeviceKind};
//! use mf_capture_windows::{MediaFoundationRuntime, MfDeviceBackend};
//!
//! let _runtime = MediaFoundationRuntime::start()?;
//! let directory = DeviceDirectory::new(MfDeviceBackend::new());
//! let camera = directory.list_devices(DeviceKind::Video)?.remove(0);
//! let session = CaptureSession::open(&directory, DeviceKind::Video, &camera.identity, &camera.name, sink)?;
//! session.start()?;
//! let handle = CaptureHandle::new(session);
//! ```

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod guids;
#[cfg(target_os = "windows")]
pub mod media_buffer;
#[cfg(target_os = "windows")]
pub mod media_type;
#[cfg(target_os = "windows")]
pub mod runtime;
#[cfg(target_os = "windows")]
pub mod source_reader;

#[cfg(target_os = "windows")]
pub use device_enumerator::MfDeviceBackend;
#[cfg(target_os = "windows")]
pub use runtime::MediaFoundationRuntime;
#[cfg(target_os = "windows")]
pub use source_reader::{WinMediaSource, WinSourceReader};

#[cfg(target_os = "windows")]
pub(crate) use helpers::{create_attributes, resource_error, status_code};

#[cfg(target_os = "windows")]
mod helpers {
    use mf_capture_core::models::error::{CaptureError, StatusCode};
    use windows::Win32::Media::MediaFoundation::{IMFAttributes, MFCreateAttributes};

    pub(crate) fn status_code(err: &windows::core::Error) -> StatusCode {
        StatusCode(err.code().0)
    }

    pub(crate) fn resource_error(context: &str) -> impl Fn(windows::core::Error) -> CaptureError + '_ {
        move |err| CaptureError::resource(context, status_code(&err))
    }

    /// Empty attribute store with room for `size` entries.
    pub(crate) fn create_attributes(size: u32) -> Result<IMFAttributes, CaptureError> {
        let mut attributes = None;
        unsafe { MFCreateAttributes(&mut attributes, size) }.map_err(resource_error("create attributes"))?;
        attributes.ok_or_else(|| CaptureError::resource("create attributes", StatusCode::FAIL))
    }
}
