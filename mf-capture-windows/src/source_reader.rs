//! Opened devices, asynchronous source readers and the COM callback adapter.

use std::sync::Arc;

use windows::core::{Ref, BOOL};
use windows::Win32::Media::MediaFoundation::{
    IMFMediaEvent, IMFMediaSource, IMFMediaTypeHandler, IMFPresentationDescriptor, IMFSample,
    IMFSourceReader, IMFSourceReaderCallback, IMFSourceReaderCallback_Impl,
    MFCreateSourceReaderFromMediaSource, MF_READWRITE_DISABLE_CONVERTERS,
    MF_SOURCE_READER_ASYNC_CALLBACK, MF_SOURCE_READER_DISCONNECT_MEDIASOURCE_ON_SHUTDOWN,
    MF_SOURCE_READER_FIRST_AUDIO_STREAM, MF_SOURCE_READER_FIRST_VIDEO_STREAM,
};
use windows_core::implement;

use mf_capture_core::models::device::{MajorType, StreamSelector};
use mf_capture_core::models::error::{CaptureError, StatusCode};
use mf_capture_core::traits::platform::{
    MediaSample, MediaSource, MediaType, ReadSampleCallback, ReaderConfig, SourceReader,
    StreamFlags,
};

use crate::guids;
use crate::media_buffer::WinSample;
use crate::media_type::WinMediaType;
use crate::{create_attributes, resource_error};

fn stream_index(stream: StreamSelector) -> u32 {
    match stream {
        StreamSelector::FirstVideo => MF_SOURCE_READER_FIRST_VIDEO_STREAM.0 as u32,
        StreamSelector::FirstAudio => MF_SOURCE_READER_FIRST_AUDIO_STREAM.0 as u32,
    }
}

/// An opened capture device (`IMFMediaSource`).
pub struct WinMediaSource {
    inner: IMFMediaSource,
}

// SAFETY: Media Foundation media sources and source readers are free-threaded
// objects; every call through these wrappers goes straight to the COM object,
// which does its own synchronization.
unsafe impl Send for WinMediaSource {}
unsafe impl Sync for WinMediaSource {}

impl WinMediaSource {
    pub fn new(inner: IMFMediaSource) -> Self {
        Self { inner }
    }

    fn presentation(&self) -> Result<IMFPresentationDescriptor, CaptureError> {
        unsafe { self.inner.CreatePresentationDescriptor() }
            .map_err(resource_error("create presentation descriptor"))
    }

    fn type_handler(&self, stream: u32) -> Result<IMFMediaTypeHandler, CaptureError> {
        let presentation = self.presentation()?;
        let mut selected = BOOL::default();
        let mut descriptor = None;
        unsafe { presentation.GetStreamDescriptorByIndex(stream, &mut selected, &mut descriptor) }
            .map_err(resource_error("get stream descriptor"))?;
        let descriptor = descriptor
            .ok_or_else(|| CaptureError::resource("get stream descriptor", StatusCode::FAIL))?;
        unsafe { descriptor.GetMediaTypeHandler() }.map_err(resource_error("get media type handler"))
    }
}

impl MediaSource for WinMediaSource {
    fn stream_count(&self) -> Result<u32, CaptureError> {
        let presentation = self.presentation()?;
        unsafe { presentation.GetStreamDescriptorCount() }
            .map_err(resource_error("get stream descriptor count"))
    }

    fn stream_major_type(&self, stream: u32) -> Result<MajorType, CaptureError> {
        let handler = self.type_handler(stream)?;
        let major = unsafe { handler.GetMajorType() }.map_err(resource_error("get major type"))?;
        Ok(guids::major_type(&major))
    }

    fn stream_media_types(&self, stream: u32) -> Result<Vec<Box<dyn MediaType>>, CaptureError> {
        let handler = self.type_handler(stream)?;
        let count =
            unsafe { handler.GetMediaTypeCount() }.map_err(resource_error("get media type count"))?;

        let mut types: Vec<Box<dyn MediaType>> = Vec::with_capacity(count as usize);
        for index in 0..count {
            match unsafe { handler.GetMediaTypeByIndex(index) } {
                Ok(media_type) => types.push(Box::new(WinMediaType::new(media_type))),
                Err(e) => log::warn!("stream {} media type {} unreadable: {}", stream, index, e),
            }
        }
        Ok(types)
    }

    fn create_source_reader(&self, config: ReaderConfig) -> Result<Box<dyn SourceReader>, CaptureError> {
        let callback: IMFSourceReaderCallback = ReaderCallback {
            target: config.callback,
        }
        .into();

        let attributes = create_attributes(3)?;
        unsafe {
            attributes
                .SetUnknown(&MF_SOURCE_READER_ASYNC_CALLBACK, &callback)
                .map_err(resource_error("set MF_SOURCE_READER_ASYNC_CALLBACK"))?;
            attributes
                .SetUINT32(&MF_READWRITE_DISABLE_CONVERTERS, config.disable_converters as u32)
                .map_err(resource_error("set MF_READWRITE_DISABLE_CONVERTERS"))?;
            attributes
                .SetUINT32(
                    &MF_SOURCE_READER_DISCONNECT_MEDIASOURCE_ON_SHUTDOWN,
                    config.disconnect_source_on_release as u32,
                )
                .map_err(resource_error("set MF_SOURCE_READER_DISCONNECT_MEDIASOURCE_ON_SHUTDOWN"))?;
        }

        let reader = unsafe { MFCreateSourceReaderFromMediaSource(&self.inner, &attributes) }
            .map_err(resource_error("MFCreateSourceReaderFromMediaSource"))?;
        Ok(Box::new(WinSourceReader { inner: reader }))
    }

    fn shutdown(&self) -> Result<(), CaptureError> {
        unsafe { self.inner.Shutdown() }.map_err(resource_error("shut down media source"))
    }
}

/// Asynchronous source reader. Releasing it shuts the underlying device down
/// unless it was created with `disconnect_source_on_release`.
pub struct WinSourceReader {
    inner: IMFSourceReader,
}

// SAFETY: see `WinMediaSource`.
unsafe impl Send for WinSourceReader {}
unsafe impl Sync for WinSourceReader {}

impl SourceReader for WinSourceReader {
    fn native_media_type(&self, stream: StreamSelector, index: u32) -> Option<Box<dyn MediaType>> {
        unsafe { self.inner.GetNativeMediaType(stream_index(stream), index) }
            .ok()
            .map(|media_type| Box::new(WinMediaType::new(media_type)) as Box<dyn MediaType>)
    }

    fn set_current_media_type(
        &self,
        stream: StreamSelector,
        media_type: &dyn MediaType,
    ) -> Result<(), CaptureError> {
        let media_type = media_type
            .as_any()
            .downcast_ref::<WinMediaType>()
            .ok_or_else(|| {
                CaptureError::PreconditionViolation("media type did not come from this reader".into())
            })?;
        unsafe {
            self.inner
                .SetCurrentMediaType(stream_index(stream), None, media_type.raw())
        }
        .map_err(resource_error("set current media type"))
    }

    fn read_sample(&self, stream: StreamSelector) -> Result<(), CaptureError> {
        // Async mode: every out parameter stays null, the result arrives in OnReadSample.
        unsafe {
            self.inner
                .ReadSample(stream_index(stream), 0, None, None, None, None)
        }
        .map_err(|e| CaptureError::Delivery(crate::status_code(&e)))
    }
}

/// Forwards `IMFSourceReaderCallback` completions to the core callback.
///
/// The reader holds the only COM reference; the core callback stays alive as
/// long as the reader does.
#[implement(IMFSourceReaderCallback)]
struct ReaderCallback {
    target: Arc<dyn ReadSampleCallback>,
}

impl IMFSourceReaderCallback_Impl for ReaderCallback_Impl {
    fn OnReadSample(
        &self,
        hrstatus: windows::core::HRESULT,
        _dwstreamindex: u32,
        dwstreamflags: u32,
        lltimestamp: i64,
        psample: Ref<'_, IMFSample>,
    ) -> windows::core::Result<()> {
        let sample = psample.as_ref().map(|sample| WinSample::new(sample.clone()));
        self.target.on_read_sample(
            StatusCode(hrstatus.0),
            StreamFlags(dwstreamflags),
            lltimestamp,
            sample.as_ref().map(|sample| sample as &dyn MediaSample),
        );
        Ok(())
    }

    fn OnFlush(&self, _dwstreamindex: u32) -> windows::core::Result<()> {
        Ok(())
    }

    fn OnEvent(&self, _dwstreamindex: u32, _pevent: Ref<'_, IMFMediaEvent>) -> windows::core::Result<()> {
        Ok(())
    }
}
