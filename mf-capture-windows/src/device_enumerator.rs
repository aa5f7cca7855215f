//! Capture device enumeration via `MFEnumDeviceSources`.
//!
//! Lists video (VIDCAP) and audio (AUDCAP) capture sources with their friendly
//! names and symbolic links, and reopens a device from a symbolic link
//! observed earlier, including DirectShow device paths for the same camera.

use std::ptr;
use std::slice;
use std::sync::Arc;

use windows::core::{GUID, HSTRING, PWSTR};
use windows::Win32::Media::MediaFoundation::{
    IMFActivate, IMFAttributes, IMFMediaSource, MFCreateDeviceSource, MFEnumDeviceSources,
    MF_DEVSOURCE_ATTRIBUTE_FRIENDLY_NAME, MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE,
    MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_AUDCAP_ENDPOINT_ID,
    MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_AUDCAP_GUID,
    MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_AUDCAP_SYMBOLIC_LINK,
    MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_GUID,
    MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_SYMBOLIC_LINK,
};
use windows::Win32::System::Com::CoTaskMemFree;

use mf_capture_core::models::device::DeviceKind;
use mf_capture_core::models::error::CaptureError;
use mf_capture_core::traits::platform::{DeviceActivation, DeviceBackend, MediaSource};

use crate::source_reader::WinMediaSource;
use crate::{create_attributes, resource_error};

fn source_type(kind: DeviceKind) -> GUID {
    match kind {
        DeviceKind::Video => MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_GUID,
        DeviceKind::Audio => MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_AUDCAP_GUID,
    }
}

fn symbolic_link_key(kind: DeviceKind) -> GUID {
    match kind {
        DeviceKind::Video => MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_SYMBOLIC_LINK,
        DeviceKind::Audio => MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_AUDCAP_SYMBOLIC_LINK,
    }
}

fn kind_attributes(kind: DeviceKind, size: u32) -> Result<IMFAttributes, CaptureError> {
    let attributes = create_attributes(size)?;
    unsafe { attributes.SetGUID(&MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE, &source_type(kind)) }
        .map_err(resource_error("set MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE"))?;
    Ok(attributes)
}

/// DirectShow device paths and MF symbolic links for one camera differ only in
/// the interface class GUID (`#{...}`) and letter case.
fn same_device_instance(a: &str, b: &str) -> bool {
    let instance = |link: &str| link.split("#{").next().unwrap_or(link).to_ascii_lowercase();
    instance(a) == instance(b)
}

/// Media Foundation implementation of [`DeviceBackend`].
///
/// Requires a live [`crate::MediaFoundationRuntime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MfDeviceBackend;

impl MfDeviceBackend {
    pub fn new() -> Self {
        Self
    }

    fn activations(&self, kind: DeviceKind) -> Result<Vec<WinActivation>, CaptureError> {
        let attributes = kind_attributes(kind, 1)?;
        let mut raw: *mut Option<IMFActivate> = ptr::null_mut();
        let mut count = 0u32;
        unsafe {
            MFEnumDeviceSources(&attributes, &mut raw, &mut count)
                .map_err(resource_error("MFEnumDeviceSources"))?;
            if raw.is_null() {
                return Ok(Vec::new());
            }
            // The array is ours to free; taking each entry moves its reference out.
            let devices = slice::from_raw_parts_mut(raw, count as usize)
                .iter_mut()
                .filter_map(Option::take)
                .map(|inner| WinActivation { kind, inner })
                .collect();
            CoTaskMemFree(Some(raw as *const _));
            Ok(devices)
        }
    }
}

impl DeviceBackend for MfDeviceBackend {
    fn enumerate(&self, kind: DeviceKind) -> Result<Vec<Box<dyn DeviceActivation>>, CaptureError> {
        Ok(self
            .activations(kind)?
            .into_iter()
            .map(|activation| Box::new(activation) as Box<dyn DeviceActivation>)
            .collect())
    }

    /// Create the device straight from its symbolic link. If the platform
    /// refuses the link, fall back to the enumerated device whose identity
    /// names the same device instance.
    fn open_device(
        &self,
        kind: DeviceKind,
        identity: &str,
        name: Option<&str>,
    ) -> Result<Arc<dyn MediaSource>, CaptureError> {
        let attributes = kind_attributes(kind, 3)?;
        unsafe {
            attributes
                .SetString(&symbolic_link_key(kind), &HSTRING::from(identity))
                .map_err(resource_error("set symbolic link"))?;
            if let Some(name) = name {
                attributes
                    .SetString(&MF_DEVSOURCE_ATTRIBUTE_FRIENDLY_NAME, &HSTRING::from(name))
                    .map_err(resource_error("set friendly name"))?;
            }
        }

        let direct_error = match unsafe { MFCreateDeviceSource(&attributes) } {
            Ok(source) => return Ok(Arc::new(WinMediaSource::new(source))),
            Err(e) => e,
        };
        log::debug!("MFCreateDeviceSource({}) failed: {}", identity, direct_error);

        let matching = self
            .activations(kind)?
            .into_iter()
            .find(|activation| {
                activation
                    .identity()
                    .is_ok_and(|candidate| same_device_instance(&candidate, identity))
            });
        match matching {
            Some(activation) => activation.activate(),
            None => Err(CaptureError::DeviceNotAvailable(format!(
                "{} device {}: {}",
                kind, identity, direct_error
            ))),
        }
    }
}

/// An enumerated, not yet activated, device.
pub struct WinActivation {
    kind: DeviceKind,
    inner: IMFActivate,
}

impl WinActivation {
    fn string(&self, key: &GUID) -> Result<String, CaptureError> {
        let mut value = PWSTR::null();
        let mut length = 0u32;
        unsafe {
            self.inner
                .GetAllocatedString(key, &mut value, &mut length)
                .map_err(resource_error("read device attribute"))?;
            let text = value.to_string();
            CoTaskMemFree(Some(value.0 as *const _));
            text.map_err(|e| CaptureError::DeviceNotAvailable(format!("device attribute is not UTF-16: {}", e)))
        }
    }
}

impl DeviceActivation for WinActivation {
    fn friendly_name(&self) -> Result<String, CaptureError> {
        self.string(&MF_DEVSOURCE_ATTRIBUTE_FRIENDLY_NAME)
    }

    fn identity(&self) -> Result<String, CaptureError> {
        self.string(&symbolic_link_key(self.kind))
    }

    fn audio_endpoint(&self) -> Option<String> {
        match self.kind {
            DeviceKind::Audio => self.string(&MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_AUDCAP_ENDPOINT_ID).ok(),
            DeviceKind::Video => None,
        }
    }

    fn activate(&self) -> Result<Arc<dyn MediaSource>, CaptureError> {
        let source = unsafe { self.inner.ActivateObject::<IMFMediaSource>() }
            .map_err(|e| CaptureError::DeviceNotAvailable(format!("activation failed: {}", e)))?;
        Ok(Arc::new(WinMediaSource::new(source)))
    }
}
