//! Process-wide COM and Media Foundation lifetime.

use std::marker::PhantomData;

use windows::Win32::Media::MediaFoundation::{MFShutdown, MFStartup, MFSTARTUP_FULL, MF_VERSION};
use windows::Win32::System::Com::{
    CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED, COINIT_DISABLE_OLE1DDE,
};

use mf_capture_core::models::error::CaptureError;

use crate::resource_error;

/// Initializes COM on the calling thread and starts Media Foundation.
///
/// Dropping the guard shuts both down, so it must outlive every session,
/// reader and device created while it is alive. Bound to the thread that
/// created it.
pub struct MediaFoundationRuntime {
    _thread_bound: PhantomData<*const ()>,
}

impl MediaFoundationRuntime {
    pub fn start() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE)
                .ok()
                .map_err(resource_error("CoInitializeEx"))?;

            if let Err(e) = MFStartup(MF_VERSION, MFSTARTUP_FULL) {
                CoUninitialize();
                return Err(resource_error("MFStartup")(e));
            }
        }
        log::info!("Media Foundation started");
        Ok(Self {
            _thread_bound: PhantomData,
        })
    }
}

impl Drop for MediaFoundationRuntime {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = MFShutdown() {
                log::warn!("MFShutdown failed: {}", e);
            }
            CoUninitialize();
        }
        log::info!("Media Foundation shut down");
    }
}
