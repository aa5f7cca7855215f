//! `IMFMediaType` attribute view.

use std::any::Any;

use windows::core::GUID;
use windows::Win32::Media::MediaFoundation::{
    IMFMediaType, MF_MT_AUDIO_BITS_PER_SAMPLE, MF_MT_AUDIO_NUM_CHANNELS,
    MF_MT_AUDIO_SAMPLES_PER_SECOND, MF_MT_DEFAULT_STRIDE, MF_MT_FRAME_RATE,
    MF_MT_FRAME_RATE_RANGE_MAX, MF_MT_FRAME_RATE_RANGE_MIN, MF_MT_FRAME_SIZE, MF_MT_MAJOR_TYPE,
    MF_MT_SUBTYPE,
};

use mf_capture_core::models::device::MajorType;
use mf_capture_core::models::error::CaptureError;
use mf_capture_core::models::format::{FrameRate, FrameRateRange};
use mf_capture_core::traits::platform::MediaType;

use crate::{guids, resource_error};

pub struct WinMediaType {
    inner: IMFMediaType,
}

// SAFETY: media types are plain attribute stores, free-threaded in Media
// Foundation; the wrapper only reads and writes attributes through them.
unsafe impl Send for WinMediaType {}

impl WinMediaType {
    pub fn new(inner: IMFMediaType) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> &IMFMediaType {
        &self.inner
    }

    fn uint32(&self, key: &GUID) -> Option<u32> {
        unsafe { self.inner.GetUINT32(key) }.ok()
    }

    /// Attributes such as frame size pack two 32-bit values high/low into a UINT64.
    fn packed_pair(&self, key: &GUID) -> Option<(u32, u32)> {
        let packed = unsafe { self.inner.GetUINT64(key) }.ok()?;
        Some(((packed >> 32) as u32, packed as u32))
    }

    fn ratio(&self, key: &GUID) -> Option<FrameRate> {
        self.packed_pair(key).map(|(n, d)| FrameRate::new(n, d))
    }
}

impl MediaType for WinMediaType {
    fn major_type(&self) -> Option<MajorType> {
        unsafe { self.inner.GetGUID(&MF_MT_MAJOR_TYPE) }
            .ok()
            .map(|guid| guids::major_type(&guid))
    }

    fn subtype_code(&self) -> Option<u32> {
        unsafe { self.inner.GetGUID(&MF_MT_SUBTYPE) }
            .ok()
            .and_then(|guid| guids::subtype_code(&guid))
    }

    fn frame_size(&self) -> Option<(u32, u32)> {
        self.packed_pair(&MF_MT_FRAME_SIZE)
    }

    fn frame_rate(&self) -> Option<FrameRate> {
        self.ratio(&MF_MT_FRAME_RATE)
    }

    fn frame_rate_range(&self) -> Option<FrameRateRange> {
        Some(FrameRateRange {
            min: self.ratio(&MF_MT_FRAME_RATE_RANGE_MIN)?,
            max: self.ratio(&MF_MT_FRAME_RATE_RANGE_MAX)?,
        })
    }

    fn default_stride(&self) -> Option<i32> {
        // Stored as UINT32 but signed.
        self.uint32(&MF_MT_DEFAULT_STRIDE).map(|v| v as i32)
    }

    fn set_default_stride(&self, stride: i32) -> Result<(), CaptureError> {
        unsafe { self.inner.SetUINT32(&MF_MT_DEFAULT_STRIDE, stride as u32) }
            .map_err(resource_error("set MF_MT_DEFAULT_STRIDE"))
    }

    fn audio_channels(&self) -> Option<u32> {
        self.uint32(&MF_MT_AUDIO_NUM_CHANNELS)
    }

    fn audio_sample_rate(&self) -> Option<u32> {
        self.uint32(&MF_MT_AUDIO_SAMPLES_PER_SECOND)
    }

    fn audio_bits_per_sample(&self) -> Option<u32> {
        self.uint32(&MF_MT_AUDIO_BITS_PER_SAMPLE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
