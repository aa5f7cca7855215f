//! Delivered samples and their buffers.

use std::ptr;
use std::slice;

use windows::core::Interface;
use windows::Win32::Media::MediaFoundation::{
    IMF2DBuffer2, IMFMediaBuffer, IMFSample, MF2DBuffer_LockFlags_Read,
};

use mf_capture_core::models::error::StatusCode;
use mf_capture_core::traits::platform::{Buffer2D, Locked2D, MediaBuffer, MediaSample};

use crate::status_code;

pub struct WinSample {
    inner: IMFSample,
}

impl WinSample {
    pub fn new(inner: IMFSample) -> Self {
        Self { inner }
    }
}

impl MediaSample for WinSample {
    fn buffer_count(&self) -> Result<u32, StatusCode> {
        unsafe { self.inner.GetBufferCount() }.map_err(|e| status_code(&e))
    }

    fn buffer(&self, index: u32) -> Result<Box<dyn MediaBuffer>, StatusCode> {
        let buffer = unsafe { self.inner.GetBufferByIndex(index) }.map_err(|e| status_code(&e))?;
        Ok(Box::new(WinMediaBuffer::new(buffer)))
    }
}

/// Sample memory. Buffers backed by video surfaces also expose a row view.
pub struct WinMediaBuffer {
    inner: IMFMediaBuffer,
    two_d: Option<WinBuffer2D>,
}

impl WinMediaBuffer {
    pub fn new(inner: IMFMediaBuffer) -> Self {
        let two_d = inner.cast::<IMF2DBuffer2>().ok().map(WinBuffer2D);
        Self { inner, two_d }
    }
}

impl MediaBuffer for WinMediaBuffer {
    fn lock(&self) -> Result<&[u8], StatusCode> {
        let mut data = ptr::null_mut();
        let mut length = 0u32;
        unsafe {
            self.inner
                .Lock(&mut data, None, Some(&mut length))
                .map_err(|e| status_code(&e))?;
            if data.is_null() {
                let _ = self.inner.Unlock();
                return Err(StatusCode::FAIL);
            }
            // Valid until Unlock; the borrow on self keeps the buffer alive.
            Ok(slice::from_raw_parts(data, length as usize))
        }
    }

    fn unlock(&self) {
        if let Err(e) = unsafe { self.inner.Unlock() } {
            log::warn!("IMFMediaBuffer::Unlock failed: {}", e);
        }
    }

    fn as_2d(&self) -> Option<&dyn Buffer2D> {
        self.two_d.as_ref().map(|view| view as &dyn Buffer2D)
    }
}

struct WinBuffer2D(IMF2DBuffer2);

impl Buffer2D for WinBuffer2D {
    /// `Lock2DSize` reports the whole region, so `height` is not needed to
    /// bound it (chroma planes follow the luma rows).
    fn lock_2d(&self, _height: u32) -> Result<Locked2D<'_>, StatusCode> {
        let mut scan_line0 = ptr::null_mut();
        let mut pitch = 0i32;
        let mut start = ptr::null_mut();
        let mut length = 0u32;
        unsafe {
            self.0
                .Lock2DSize(
                    MF2DBuffer_LockFlags_Read,
                    &mut scan_line0,
                    &mut pitch,
                    &mut start,
                    &mut length,
                )
                .map_err(|e| status_code(&e))?;

            let offset = (scan_line0 as usize).checked_sub(start as usize);
            let offset = match offset {
                Some(offset) if !start.is_null() && offset < length as usize => offset,
                _ => {
                    let _ = self.0.Unlock2D();
                    return Err(StatusCode::FAIL);
                }
            };

            Ok(Locked2D {
                bytes: slice::from_raw_parts(start, length as usize),
                scan_line0: offset,
                stride: pitch,
            })
        }
    }

    fn unlock_2d(&self) {
        if let Err(e) = unsafe { self.0.Unlock2D() } {
            log::warn!("IMF2DBuffer::Unlock2D failed: {}", e);
        }
    }
}
