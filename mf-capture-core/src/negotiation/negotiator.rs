//! First-match format selection over a device's native media types.
//!
//! Devices report native types in a driver-defined preference order. The scan
//! never reorders or scores them: the first type satisfying the predicate is
//! applied and accepted.

use crate::models::config::VideoTarget;
use crate::models::device::DeviceKind;
use crate::models::error::CaptureError;
use crate::models::format::{AudioFormat, AudioSubtype, NegotiatedFormat, VideoFormat};
use crate::traits::platform::{MediaType, SourceReader};

/// Runs format selection against the first stream of one kind on a reader.
pub struct FormatNegotiator<'a> {
    reader: &'a dyn SourceReader,
    kind: DeviceKind,
}

impl<'a> FormatNegotiator<'a> {
    pub fn new(reader: &'a dyn SourceReader, kind: DeviceKind) -> Self {
        Self { reader, kind }
    }

    /// Walk native types in reported order and apply the first one matching
    /// `predicate`. Nothing is applied before a match.
    ///
    /// A matching type the reader refuses to apply is logged and skipped.
    pub fn select_format<P>(&self, mut predicate: P) -> Option<Box<dyn MediaType>>
    where
        P: FnMut(&dyn MediaType) -> bool,
    {
        let stream = self.kind.first_stream();
        let mut index = 0;
        while let Some(native) = self.reader.native_media_type(stream, index) {
            if predicate(native.as_ref()) {
                match self.reader.set_current_media_type(stream, native.as_ref()) {
                    Ok(()) => {
                        log::debug!("{} native type #{} applied", self.kind, index);
                        return Some(native);
                    }
                    Err(e) => log::warn!("{} native type #{} matched but was refused: {}", self.kind, index, e),
                }
            }
            index += 1;
        }
        None
    }

    /// Negotiate according to this negotiator's kind. `target` only applies to video.
    pub fn negotiate(&self, target: &VideoTarget) -> Result<NegotiatedFormat, CaptureError> {
        match self.kind {
            DeviceKind::Video => self.negotiate_video(target),
            DeviceKind::Audio => self.negotiate_audio(),
        }
    }

    /// Exact subtype and size, frame rate within the target's tolerance. No fallback.
    pub fn negotiate_video(&self, target: &VideoTarget) -> Result<NegotiatedFormat, CaptureError> {
        let accepted = self
            .select_format(|media_type| matches_video_target(media_type, target))
            .ok_or_else(|| {
                CaptureError::NegotiationFailure(format!(
                    "no native video type matches {} {}x{} @ {:.2}fps (tolerance {})",
                    target.subtype, target.width, target.height, target.fps, target.tolerance
                ))
            })?;

        let format = accepted.video_format().ok_or_else(|| {
            CaptureError::NegotiationFailure("accepted video type lost its geometry".into())
        })?;
        let default_stride = resolve_stride(accepted.as_ref(), &format)?;

        log::info!("negotiated video {} stride={}", format, default_stride);
        Ok(NegotiatedFormat::Video {
            format,
            default_stride,
        })
    }

    /// PCM or float first; PCM only when that finds nothing or leaves a zero field.
    pub fn negotiate_audio(&self) -> Result<NegotiatedFormat, CaptureError> {
        if let Some(format) = self.audio_pass(AudioSubtype::is_pcm_family) {
            if format.is_complete() {
                log::info!("negotiated audio {}", format);
                return Ok(NegotiatedFormat::Audio { format });
            }
            log::warn!("accepted audio type is incomplete ({}), retrying with PCM only", format);
        } else {
            log::warn!("no PCM or float audio type, retrying with PCM only");
        }

        match self.audio_pass(|subtype| subtype == AudioSubtype::Pcm) {
            Some(format) if format.is_complete() => {
                log::info!("negotiated audio {} (PCM fallback)", format);
                Ok(NegotiatedFormat::Audio { format })
            }
            Some(format) => Err(CaptureError::NegotiationFailure(format!(
                "PCM audio type has zero geometry: {}",
                format
            ))),
            None => Err(CaptureError::NegotiationFailure(
                "device offers no PCM or float audio type".into(),
            )),
        }
    }

    fn audio_pass(&self, accept: impl Fn(AudioSubtype) -> bool) -> Option<AudioFormat> {
        self.select_format(|media_type| media_type.audio_subtype().is_some_and(&accept))
            .and_then(|accepted| accepted.audio_format())
    }
}

/// Video predicate: exact subtype, width and height; `|num/den - fps| < tolerance`.
pub fn matches_video_target(media_type: &dyn MediaType, target: &VideoTarget) -> bool {
    if media_type.video_subtype() != Some(target.subtype) {
        return false;
    }
    if media_type.frame_size() != Some((target.width, target.height)) {
        return false;
    }
    media_type
        .frame_rate()
        .and_then(|rate| rate.fps())
        .is_some_and(|fps| (fps - target.fps).abs() < target.tolerance)
}

/// Declared stride if the type carries one, otherwise derived from the layout
/// and written back onto the type.
pub fn resolve_stride(media_type: &dyn MediaType, format: &VideoFormat) -> Result<i32, CaptureError> {
    if let Some(stride) = media_type.default_stride().filter(|s| *s != 0) {
        return Ok(stride);
    }

    let stride = format.subtype.default_stride(format.width).ok_or_else(|| {
        CaptureError::NegotiationFailure(format!(
            "cannot derive a row stride for {} at width {}",
            format.subtype, format.width
        ))
    })?;
    if let Err(e) = media_type.set_default_stride(stride) {
        log::warn!("could not persist derived stride {}: {}", stride, e);
    }
    Ok(stride)
}
