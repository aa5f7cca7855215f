//! Seams between the capture core and the host media platform.
//!
//! Implemented by `mf-capture-windows` on top of Media Foundation, and by the
//! in-crate mock platform in tests. All handles are owned wrappers; dropping
//! one releases the underlying platform object.

use std::any::Any;
use std::sync::Arc;

use crate::models::device::{DeviceKind, MajorType, StreamSelector};
use crate::models::error::{CaptureError, StatusCode};
use crate::models::format::{
    AudioFormat, AudioSubtype, FormatDescriptor, FrameRate, FrameRateRange, VideoFormat,
    VideoSubtype,
};

/// Attribute view over one platform media type.
pub trait MediaType: Send {
    fn major_type(&self) -> Option<MajorType>;

    /// First 32 bits of the subtype identifier (FourCC or WAVE format tag),
    /// when the identifier follows the standard base layout.
    fn subtype_code(&self) -> Option<u32>;

    fn frame_size(&self) -> Option<(u32, u32)>;
    fn frame_rate(&self) -> Option<FrameRate>;
    fn frame_rate_range(&self) -> Option<FrameRateRange>;

    /// Stride declared by the type itself, if any.
    fn default_stride(&self) -> Option<i32>;

    /// Persist a derived stride onto the type so later queries find it declared.
    fn set_default_stride(&self, stride: i32) -> Result<(), CaptureError>;

    fn audio_channels(&self) -> Option<u32>;
    fn audio_sample_rate(&self) -> Option<u32>;
    fn audio_bits_per_sample(&self) -> Option<u32>;

    fn as_any(&self) -> &dyn Any;

    fn video_subtype(&self) -> Option<VideoSubtype> {
        self.subtype_code().and_then(VideoSubtype::from_code)
    }

    fn audio_subtype(&self) -> Option<AudioSubtype> {
        self.subtype_code().and_then(AudioSubtype::from_code)
    }

    /// Recognized video subtype, non-zero frame size and a frame rate.
    fn video_format(&self) -> Option<VideoFormat> {
        let subtype = self.video_subtype()?;
        let (width, height) = self.frame_size().filter(|(w, h)| *w > 0 && *h > 0)?;
        let frame_rate = self.frame_rate()?;
        Some(VideoFormat {
            subtype,
            width,
            height,
            frame_rate,
            frame_rate_range: self.frame_rate_range(),
        })
    }

    /// Recognized audio subtype; missing geometry attributes read as zero.
    fn audio_format(&self) -> Option<AudioFormat> {
        Some(AudioFormat {
            subtype: self.audio_subtype()?,
            channels: self.audio_channels().unwrap_or(0),
            sample_rate: self.audio_sample_rate().unwrap_or(0),
            bits_per_sample: self.audio_bits_per_sample().unwrap_or(0),
        })
    }

    fn format_descriptor(&self, kind: DeviceKind) -> Option<FormatDescriptor> {
        match kind {
            DeviceKind::Video => self.video_format().map(FormatDescriptor::Video),
            DeviceKind::Audio => self
                .audio_format()
                .filter(AudioFormat::is_complete)
                .map(FormatDescriptor::Audio),
        }
    }
}

/// Flags reported alongside each delivered sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFlags(pub u32);

impl StreamFlags {
    pub const ERROR: u32 = 0x0001;
    pub const END_OF_STREAM: u32 = 0x0002;
    pub const NEW_STREAM: u32 = 0x0004;
    pub const NATIVE_MEDIATYPE_CHANGED: u32 = 0x0010;
    pub const CURRENT_MEDIATYPE_CHANGED: u32 = 0x0020;
    pub const STREAM_TICK: u32 = 0x0100;

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn is_stream_tick(self) -> bool {
        self.contains(Self::STREAM_TICK)
    }
}

/// Asynchronous delivery target registered with a subscription.
///
/// Invoked on a platform thread, once per completed read request.
pub trait ReadSampleCallback: Send + Sync {
    fn on_read_sample(
        &self,
        status: StatusCode,
        flags: StreamFlags,
        timestamp: i64,
        sample: Option<&dyn MediaSample>,
    );
}

/// Settings used to create a delivery subscription.
pub struct ReaderConfig {
    /// Deliver the native format untouched; no converters are inserted.
    pub disable_converters: bool,
    /// Releasing the subscription leaves the device running; the owner shuts it down.
    pub disconnect_source_on_release: bool,
    pub callback: Arc<dyn ReadSampleCallback>,
}

/// A live delivery subscription bound to one device.
pub trait SourceReader: Send + Sync {
    /// Native type `index` of `stream`; `None` once the list is exhausted.
    fn native_media_type(&self, stream: StreamSelector, index: u32) -> Option<Box<dyn MediaType>>;

    fn set_current_media_type(
        &self,
        stream: StreamSelector,
        media_type: &dyn MediaType,
    ) -> Result<(), CaptureError>;

    /// Request the next sample on `stream`. Completion arrives via the callback.
    fn read_sample(&self, stream: StreamSelector) -> Result<(), CaptureError>;
}

/// An opened capture device.
pub trait MediaSource: Send + Sync {
    fn stream_count(&self) -> Result<u32, CaptureError>;
    fn stream_major_type(&self, stream: u32) -> Result<MajorType, CaptureError>;

    /// All media types the stream's handler advertises, in reported order.
    fn stream_media_types(&self, stream: u32) -> Result<Vec<Box<dyn MediaType>>, CaptureError>;

    fn create_source_reader(&self, config: ReaderConfig) -> Result<Box<dyn SourceReader>, CaptureError>;

    fn shutdown(&self) -> Result<(), CaptureError>;
}

/// One delivered sample.
pub trait MediaSample {
    fn buffer_count(&self) -> Result<u32, StatusCode>;
    fn buffer(&self, index: u32) -> Result<Box<dyn MediaBuffer>, StatusCode>;
}

/// A sample's memory block, lockable as a flat byte range.
///
/// The slice returned by `lock` is valid until the matching `unlock`.
pub trait MediaBuffer {
    fn lock(&self) -> Result<&[u8], StatusCode>;
    fn unlock(&self);

    /// Row-addressable view, when this particular buffer supports one.
    fn as_2d(&self) -> Option<&dyn Buffer2D>;
}

/// Row-addressable lock result.
#[derive(Debug, Clone, Copy)]
pub struct Locked2D<'a> {
    /// The whole locked region, in memory order.
    pub bytes: &'a [u8],
    /// Offset of scan line 0 within `bytes`.
    pub scan_line0: usize,
    /// Actual pitch; negative for bottom-up images.
    pub stride: i32,
}

pub trait Buffer2D {
    fn lock_2d(&self, height: u32) -> Result<Locked2D<'_>, StatusCode>;
    fn unlock_2d(&self);
}

/// A device found by enumeration, not yet opened.
pub trait DeviceActivation {
    fn friendly_name(&self) -> Result<String, CaptureError>;

    /// Symbolic link identifying the device.
    fn identity(&self) -> Result<String, CaptureError>;

    fn audio_endpoint(&self) -> Option<String>;

    fn activate(&self) -> Result<Arc<dyn MediaSource>, CaptureError>;
}

/// Host device enumeration.
pub trait DeviceBackend: Send + Sync {
    fn enumerate(&self, kind: DeviceKind) -> Result<Vec<Box<dyn DeviceActivation>>, CaptureError>;

    /// Open a device from an identity string observed earlier, by any subsystem.
    fn open_device(
        &self,
        kind: DeviceKind,
        identity: &str,
        name: Option<&str>,
    ) -> Result<Arc<dyn MediaSource>, CaptureError>;
}
