use std::sync::Arc;

use crate::models::device::{DeviceDescriptor, DeviceKind};
use crate::models::error::CaptureError;
use crate::models::format::FormatDescriptor;
use crate::traits::platform::{DeviceActivation, DeviceBackend, MediaSource};

/// Lists capture devices and reopens them from a previously observed identity.
pub struct DeviceDirectory<B: DeviceBackend> {
    backend: B,
}

impl<B: DeviceBackend> DeviceDirectory<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Every device of `kind` with its advertised formats.
    ///
    /// An empty list is not an error. Devices whose name or identity cannot be
    /// read are skipped; a device whose capabilities cannot be read is listed
    /// with no formats.
    pub fn list_devices(&self, kind: DeviceKind) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        let activations = self.backend.enumerate(kind)?;
        log::info!("found {} {} device(s)", activations.len(), kind);

        let mut devices = Vec::with_capacity(activations.len());
        for (index, activation) in activations.iter().enumerate() {
            let Some(descriptor) = describe(kind, index, activation.as_ref()) else {
                continue;
            };
            log::info!("{}", descriptor);
            for format in &descriptor.formats {
                log::info!("    {}", format);
            }
            devices.push(descriptor);
        }
        Ok(devices)
    }

    /// Reopen a device from an identity string, produced by either capture
    /// subsystem, plus an optional display name.
    pub fn resolve(
        &self,
        kind: DeviceKind,
        identity: &str,
        name: Option<&str>,
    ) -> Result<Arc<dyn MediaSource>, CaptureError> {
        if identity.trim().is_empty() {
            return Err(CaptureError::PreconditionViolation(
                "device identity must not be empty".into(),
            ));
        }
        log::debug!("resolving {} device {}", kind, identity);
        self.backend.open_device(kind, identity, name)
    }

    /// First device of `kind` whose display name contains `needle`.
    pub fn find_by_name(
        &self,
        kind: DeviceKind,
        needle: &str,
    ) -> Result<Option<DeviceDescriptor>, CaptureError> {
        Ok(self
            .list_devices(kind)?
            .into_iter()
            .find(|device| device.name_contains(needle)))
    }
}

fn describe(kind: DeviceKind, index: usize, activation: &dyn DeviceActivation) -> Option<DeviceDescriptor> {
    let name = match activation.friendly_name() {
        Ok(name) => name,
        Err(e) => {
            log::warn!("{} device #{}: unreadable name: {}", kind, index, e);
            return None;
        }
    };
    let identity = match activation.identity() {
        Ok(identity) if !identity.is_empty() => identity,
        Ok(_) => {
            log::warn!("{} device \"{}\": empty identity, skipped", kind, name);
            return None;
        }
        Err(e) => {
            log::warn!("{} device \"{}\": unreadable identity: {}", kind, name, e);
            return None;
        }
    };

    let formats = match probe_formats(kind, activation) {
        Ok(formats) => formats,
        Err(e) => {
            log::warn!("{} device \"{}\": capabilities unavailable: {}", kind, name, e);
            Vec::new()
        }
    };

    Some(DeviceDescriptor {
        kind,
        name,
        identity,
        audio_endpoint: match kind {
            DeviceKind::Audio => activation.audio_endpoint(),
            DeviceKind::Video => None,
        },
        formats,
    })
}

fn probe_formats(
    kind: DeviceKind,
    activation: &dyn DeviceActivation,
) -> Result<Vec<FormatDescriptor>, CaptureError> {
    let source = activation.activate()?;
    let formats = capability_formats(source.as_ref(), kind);
    if let Err(e) = source.shutdown() {
        log::warn!("shutting down probed {} device failed: {}", kind, e);
    }
    formats
}

/// Recognized formats of the first stream of `kind`'s major type, in reported order.
pub fn capability_formats(
    source: &dyn MediaSource,
    kind: DeviceKind,
) -> Result<Vec<FormatDescriptor>, CaptureError> {
    let wanted = kind.major_type();
    for stream in 0..source.stream_count()? {
        if source.stream_major_type(stream)? != wanted {
            continue;
        }
        return Ok(source
            .stream_media_types(stream)?
            .iter()
            .filter_map(|media_type| media_type.format_descriptor(kind))
            .collect());
    }
    Ok(Vec::new())
}
